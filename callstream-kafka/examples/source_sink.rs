//! Produce two calls into a topic and aggregate the topic for half a minute.
//! Expects a broker on localhost:9092.
use std::time::Duration;

use callstream::job::{Shutdown, StreamingJob};
use callstream::sinks::StdOutSink;
use callstream::snapshot::IntervalTrigger;
use callstream_kafka::{KafkaRecord, KafkaSink, KafkaSource, StartingOffsets};

fn main() {
    let mut sink = KafkaSink::builder()
        .broker("localhost:9092")
        .client_id("callstream-example")
        // https://github.com/confluentinc/librdkafka/blob/master/CONFIGURATION.md
        // for all supported config values
        .conf("linger.ms", "5")
        .build()
        .unwrap();
    for crime_type in ["Traffic Stop", "Passing Call"] {
        let payload = format!(
            r#"{{"original_crime_type_name": "{crime_type}", "disposition": "HAN", "call_date_time": "2018-12-31T23:50:00"}}"#
        );
        let record = KafkaRecord::builder()
            .topic("department.call.service.log")
            .payload(payload.into_bytes())
            .build();
        sink.send(&record).unwrap();
    }
    sink.flush(Duration::from_secs(5)).unwrap();

    let source = KafkaSource::builder()
        .broker("localhost:9092")
        .topic("department.call.service.log")
        .group_id("callstream-example")
        .starting_offsets(StartingOffsets::Earliest)
        .build()
        .connect()
        .unwrap();

    let shutdown = Shutdown::new();
    let stop = shutdown.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_secs(30));
        stop.trigger();
    });
    let outcome = StreamingJob::builder()
        .source(source)
        .sink(StdOutSink::new())
        .trigger(IntervalTrigger::new(Duration::from_secs(10)))
        .shutdown(shutdown)
        .build()
        .run()
        .unwrap();
    println!("{:?}", outcome.final_snapshot.counts());
}
