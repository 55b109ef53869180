#![forbid(unsafe_code)]

//! The client handle: owns the databases, the transaction queue, the RNG
//! and the clock, and routes every command through them.

mod clock;
mod typed;

use mr_command::{dispatch_argv, is_unsupported_command};
use mr_config::{ConfigError, EngineConfig};
use mr_protocol::Reply;
use mr_store::Databases;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Instant;
use tracing::{debug, warn};

pub use clock::{Clock, ManualClock, SystemClock};
pub use mr_command::{CommandError, CommandId, ErrorKind};

#[derive(Debug, Clone, Default)]
struct TransactionState {
    in_transaction: bool,
    command_queue: Vec<Vec<Vec<u8>>>,
}

/// One logical connection to an in-process keyspace.
#[derive(Debug)]
pub struct Client {
    config: EngineConfig,
    dbs: Databases,
    transaction_state: TransactionState,
    rng: StdRng,
    clock: Box<dyn Clock>,
}

impl Default for Client {
    fn default() -> Self {
        Self::build(EngineConfig::default(), Box::new(SystemClock))
    }
}

impl Client {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, Box::new(SystemClock)))
    }

    /// A client reading time from `clock` instead of the wall clock.
    pub fn with_clock(config: EngineConfig, clock: impl Clock + 'static) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, Box::new(clock)))
    }

    fn build(config: EngineConfig, clock: Box<dyn Clock>) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            dbs: Databases::new(config.databases),
            config,
            transaction_state: TransactionState::default(),
            rng,
            clock,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction_state.in_transaction
    }

    #[must_use]
    pub fn queued_commands(&self) -> usize {
        self.transaction_state.command_queue.len()
    }

    #[must_use]
    pub fn current_db(&self) -> usize {
        self.dbs.current_index()
    }

    /// Hex SHA-256 over the contents of every database.
    #[must_use]
    pub fn state_digest(&self) -> String {
        self.dbs.state_digest()
    }

    /// Runs one command given as `[name, arg, ...]`.
    pub fn execute<I, A>(&mut self, argv: I) -> Result<Reply, CommandError>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let argv: Vec<Vec<u8>> = argv.into_iter().map(|arg| arg.as_ref().to_vec()).collect();
        self.execute_argv(argv)
    }

    /// Runs `name` with `args`.
    pub fn call<I, A>(&mut self, name: &str, args: I) -> Result<Reply, CommandError>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let mut argv = vec![name.as_bytes().to_vec()];
        argv.extend(args.into_iter().map(|arg| arg.as_ref().to_vec()));
        self.execute_argv(argv)
    }

    /// Runs the command, then hands its result to `callback`.
    pub fn execute_with<I, A, F, R>(&mut self, argv: I, callback: F) -> R
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
        F: FnOnce(Result<Reply, CommandError>) -> R,
    {
        callback(self.execute(argv))
    }

    pub fn call_with<I, A, F, R>(&mut self, name: &str, args: I, callback: F) -> R
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
        F: FnOnce(Result<Reply, CommandError>) -> R,
    {
        callback(self.call(name, args))
    }

    fn execute_argv(&mut self, argv: Vec<Vec<u8>>) -> Result<Reply, CommandError> {
        let Some(name) = argv.first() else {
            return Err(CommandError::UnknownCommand(String::new()));
        };
        if name.eq_ignore_ascii_case(b"multi") {
            return self.handle_multi_command();
        }
        if name.eq_ignore_ascii_case(b"exec") {
            return self.handle_exec_command();
        }
        if name.eq_ignore_ascii_case(b"discard") {
            return self.handle_discard_command();
        }
        if self.transaction_state.in_transaction {
            self.transaction_state.command_queue.push(argv);
            return Ok(Reply::queued());
        }
        self.run_command(&argv)
    }

    fn run_command(&mut self, argv: &[Vec<u8>]) -> Result<Reply, CommandError> {
        let name = String::from_utf8_lossy(&argv[0]).to_ascii_lowercase();
        if is_unsupported_command(&argv[0]) {
            if self.config.bypass_unsupported {
                warn!(command = %name, "unsupported command bypassed");
                return Ok(Reply::null_bulk());
            }
            return Err(CommandError::Unsupported);
        }
        let started = Instant::now();
        let now_ms = self.clock.now_ms();
        let result = dispatch_argv(argv, &mut self.dbs, &mut self.rng, now_ms);
        if self.config.debug {
            let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
            let args = argv.len() - 1;
            match &result {
                Ok(reply) => debug!(command = %name, args, elapsed_us, %reply, "command ok"),
                Err(err) => debug!(command = %name, args, elapsed_us, error = %err, "command failed"),
            }
        }
        result
    }

    fn handle_multi_command(&mut self) -> Result<Reply, CommandError> {
        if self.transaction_state.in_transaction {
            return Err(CommandError::NestedMulti);
        }
        self.transaction_state.in_transaction = true;
        self.transaction_state.command_queue.clear();
        if self.config.debug {
            debug!("multi");
        }
        Ok(Reply::ok())
    }

    fn handle_exec_command(&mut self) -> Result<Reply, CommandError> {
        if !self.transaction_state.in_transaction {
            return Err(CommandError::ExecWithoutMulti);
        }
        let queued = std::mem::take(&mut self.transaction_state.command_queue);
        self.transaction_state.in_transaction = false;
        if self.config.debug {
            debug!(commands = queued.len(), "exec");
        }
        let results = queued
            .iter()
            .map(|argv| match self.run_command(argv) {
                Ok(reply) => reply,
                Err(err) => Reply::Error(err.to_string()),
            })
            .collect();
        Ok(Reply::array(results))
    }

    fn handle_discard_command(&mut self) -> Result<Reply, CommandError> {
        if !self.transaction_state.in_transaction {
            return Err(CommandError::DiscardWithoutMulti);
        }
        let dropped = self.transaction_state.command_queue.len();
        self.transaction_state = TransactionState::default();
        if self.config.debug {
            debug!(commands = dropped, "discard");
        }
        Ok(Reply::ok())
    }
}
