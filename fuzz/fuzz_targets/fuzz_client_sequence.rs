#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mr_config::EngineConfig;
use mr_protocol::Reply;
use mr_runtime::{Client, CommandId, ManualClock};

#[derive(Debug, Arbitrary)]
struct Step {
    command: u8,
    args: Vec<Vec<u8>>,
    advance_ms: u8,
}

#[derive(Debug, Arbitrary)]
struct Session {
    seed: u64,
    bypass: bool,
    steps: Vec<Step>,
}

fuzz_target!(|session: Session| {
    let clock = ManualClock::new(1_000_000);
    let config = EngineConfig::default()
        .with_rng_seed(session.seed)
        .with_bypass_unsupported(session.bypass);
    let Ok(mut client) = Client::with_clock(config, clock.clone()) else {
        return;
    };
    for step in session.steps.into_iter().take(64) {
        let id = CommandId::ALL[usize::from(step.command) % CommandId::ALL.len()];
        let mut argv = vec![id.name().as_bytes().to_vec()];
        argv.extend(step.args.into_iter().take(8));
        let queuing = client.in_transaction();
        let result = client.execute(&argv);
        match id {
            CommandId::Multi => {
                assert!(client.in_transaction());
                assert_eq!(result.is_err(), queuing);
            }
            CommandId::Exec | CommandId::Discard => {
                assert!(!client.in_transaction());
                assert_eq!(result.is_ok(), queuing);
            }
            _ if queuing => assert_eq!(result, Ok(Reply::queued())),
            _ => {}
        }
        clock.advance(u64::from(step.advance_ms));
    }
});
