//! Feed a handful of out-of-order calls through the engine and print every snapshot.
//! The last batch holds a call from the day before which arrives after the watermark
//! passed it and is therefore not counted.
use callstream::job::StreamingJob;
use callstream::join::{enrich, format_enriched, RadioCodeEntry, RadioCodes};
use callstream::sinks::StdOutSink;
use callstream::sources::VecSource;
use serde_json::json;

fn call(crime_type: &str, disposition: &str, time: &str) -> Vec<u8> {
    json!({
        "crime_id": "183653763",
        "original_crime_type_name": crime_type,
        "disposition": disposition,
        "call_date_time": time,
    })
    .to_string()
    .into_bytes()
}

fn code(disposition: &str, description: &str) -> RadioCodeEntry {
    RadioCodeEntry {
        disposition: disposition.to_owned(),
        description: description.to_owned(),
    }
}

fn main() {
    tracing_subscriber::fmt().init();

    let source = VecSource::from_batches([
        vec![
            call("Traffic Stop", "CIT", "2018-12-31T23:50:00"),
            call("Passing Call", "HAN", "2018-12-31T23:55:00"),
        ],
        vec![
            call("Traffic Stop", "ADV", "2019-01-01T01:30:00"),
            call("Suspicious Person", "GOA", "2019-01-01T01:31:00"),
        ],
        vec![call("Passing Call", "HAN", "2018-12-31T22:00:00")],
    ]);

    let outcome = StreamingJob::builder()
        .source(source)
        .sink(StdOutSink::new())
        .trigger(|| true)
        .build()
        .run()
        .unwrap();

    let radio_codes: RadioCodes = [code("ADV", "Advised"), code("HAN", "Handled"), code("CIT", "Cited")]
        .into_iter()
        .collect();
    print!("{}", format_enriched(&enrich(&outcome.final_snapshot, &radio_codes)));
}
