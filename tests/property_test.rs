use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use runwire::adapters::control::MemoryControlStore;
use runwire::domain::models::ExecutionVariables;
use runwire::domain::ports::ControlStore;
use runwire::services::providers::cron_tz::{convert_cron_to_utc, parse_timezone};
use runwire::services::providers::template::render;
use runwire::services::providers::ScheduleConfig;
use runwire::services::ResponseCursor;
use serde_json::{json, Value};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn schedule_config_requires_exactly_one_target(
        workflow in any::<bool>(),
        prompt in proptest::option::of("[a-z]{1,12}"),
        workflow_id in proptest::option::of("wf-[a-z0-9]{1,8}"),
    ) {
        let mut config = json!({
            "cron_expression": "15 6 * * 1-5",
            "execution_type": if workflow { "workflow" } else { "agent" },
        });
        if let Some(prompt) = &prompt {
            config["agent_prompt"] = json!(prompt);
        }
        if let Some(workflow_id) = &workflow_id {
            config["workflow_id"] = json!(workflow_id);
        }

        let valid = if workflow {
            prompt.is_none() && workflow_id.is_some()
        } else {
            prompt.is_some() && workflow_id.is_none()
        };
        prop_assert_eq!(ScheduleConfig::parse(&config).is_ok(), valid);
    }

    #[test]
    fn escaped_braces_render_literally(text in "[a-z {}]{0,40}") {
        let escaped = text.replace('{', "{{").replace('}', "}}");
        prop_assert_eq!(render(&escaped, &ExecutionVariables::new()).unwrap(), text);
    }

    #[test]
    fn whole_hour_offsets_shift_only_the_hour(minute in 0u32..60, hour in 0u32..24) {
        // POSIX sign convention: Etc/GMT+5 is five hours behind UTC.
        let tz = parse_timezone("Etc/GMT+5").unwrap();
        let reference = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let converted = convert_cron_to_utc(&format!("{minute} {hour} * * *"), tz, reference);
        prop_assert_eq!(converted, format!("{} {} * * *", minute, (hour + 5) % 24));
    }

    #[test]
    fn cursor_reads_every_item_exactly_once(
        batches in proptest::collection::vec(0usize..5, 1..8),
        extra_reads in 0usize..3,
    ) {
        let (emitted, total) = block_on(async {
            let store = MemoryControlStore::new();
            let key = "agent_run:prop:responses";
            let mut cursor = ResponseCursor::default();
            let mut emitted: Vec<Value> = Vec::new();
            let mut total = 0u64;

            for batch in &batches {
                for _ in 0..*batch {
                    store.push(key, &json!({"seq": total}).to_string()).await.unwrap();
                    total += 1;
                }
                // Spurious wake-ups re-read without new data.
                for _ in 0..=extra_reads {
                    emitted.extend(cursor.read_new(&store, key).await.unwrap());
                }
            }
            (emitted, total)
        });

        let expected: Vec<Value> = (0..total).map(|seq| json!({"seq": seq})).collect();
        prop_assert_eq!(emitted, expected);
    }
}
