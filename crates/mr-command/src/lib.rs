#![forbid(unsafe_code)]

//! Command engine: turns an argv into store operations and a [`Reply`].
//!
//! Every command validates its whole argument list before it touches the
//! store, so a command that fails leaves the keyspace unchanged.

mod geo;
mod hash;
mod keyspace;
mod list;
mod set;
mod string;
mod zset;

use mr_protocol::Reply;
use mr_store::{Databases, RangeParseError, StoreError, format_float};
use rand::rngs::StdRng;
use thiserror::Error;

pub use geo::{
    GEO_EARTH_RADIUS_IN_METERS, geo_decode_score, geo_distance_m, geo_encode_wgs84,
    geo_hash_string_from_score,
};

/// A failed command. `Display` renders the exact server error line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
    #[error("ERR value is not a valid float")]
    NotAValidFloat,
    #[error("ERR min or max is not a float")]
    RangeNotAFloat,
    #[error("ERR resulting score is not a number (NaN)")]
    ScoreIsNan,
    #[error("ERR no such key")]
    NoSuchKey,
    #[error("BUSYKEY Target key name already exists.")]
    BusyKey,
    #[error("ERR syntax error")]
    SyntaxError,
    #[error("ERR min or max not valid string range item")]
    InvalidLexRange,
    #[error("ERR BITOP NOT must be called with a single source key.")]
    BitopNotArity,
    #[error("ERR INCR option supports a single increment-element pair")]
    ZaddIncrPair,
    #[error("ERR unsupported unit provided. please use M, KM, FT, MI")]
    UnknownUnit,
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("ERR DUMP payload version or checksum are wrong")]
    BadPayload,
    #[error("ERR operation not supported")]
    Unsupported,
    #[error("ERR MULTI calls can not be nested")]
    NestedMulti,
    #[error("ERR EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("ERR DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("ERR increment or decrement would overflow")]
    IntegerOverflow,
    #[error("ERR index out of range")]
    IndexOutOfRange,
    #[error("ERR offset is out of range")]
    OffsetOutOfRange,
    #[error("ERR bit offset is not an integer or out of range")]
    BitOffsetOutOfRange,
    #[error("ERR bit is not an integer or out of range")]
    BitValueOutOfRange,
    #[error("ERR DB index is out of range")]
    DbIndexOutOfRange,
    #[error("ERR source and destination objects are the same")]
    SameObject,
    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpireTime(&'static str),
    #[error("ERR value is out of range, must be positive")]
    NegativeCount,
    #[error("ERR Invalid TTL value, must be >= 0")]
    NegativeTtl,
    #[error("ERR invalid longitude,latitude pair {0:.6},{1:.6}")]
    InvalidCoordinates(f64, f64),
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),
}

/// Coarse classification of [`CommandError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotAnInteger,
    NotAValidFloat,
    NoSuchKey,
    BusyKey,
    SyntaxError,
    WrongNumberOfArguments,
    WrongType,
    WrongPayload,
    Unsupported,
    TransactionState,
    OutOfRange,
    UnknownCommand,
}

impl CommandError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAnInteger => ErrorKind::NotAnInteger,
            Self::NotAValidFloat | Self::RangeNotAFloat | Self::ScoreIsNan => {
                ErrorKind::NotAValidFloat
            }
            Self::NoSuchKey => ErrorKind::NoSuchKey,
            Self::BusyKey => ErrorKind::BusyKey,
            Self::SyntaxError
            | Self::InvalidLexRange
            | Self::BitopNotArity
            | Self::ZaddIncrPair
            | Self::UnknownUnit => ErrorKind::SyntaxError,
            Self::WrongArity(_) => ErrorKind::WrongNumberOfArguments,
            Self::WrongType => ErrorKind::WrongType,
            Self::BadPayload => ErrorKind::WrongPayload,
            Self::Unsupported => ErrorKind::Unsupported,
            Self::NestedMulti | Self::ExecWithoutMulti | Self::DiscardWithoutMulti => {
                ErrorKind::TransactionState
            }
            Self::IntegerOverflow
            | Self::IndexOutOfRange
            | Self::OffsetOutOfRange
            | Self::BitOffsetOutOfRange
            | Self::BitValueOutOfRange
            | Self::DbIndexOutOfRange
            | Self::SameObject
            | Self::InvalidExpireTime(_)
            | Self::NegativeCount
            | Self::NegativeTtl
            | Self::InvalidCoordinates(..) => ErrorKind::OutOfRange,
            Self::UnknownCommand(_) => ErrorKind::UnknownCommand,
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::ValueNotInteger => Self::NotAnInteger,
            StoreError::ValueNotFloat => Self::NotAValidFloat,
            StoreError::IntegerOverflow => Self::IntegerOverflow,
            StoreError::ScoreIsNan => Self::ScoreIsNan,
            StoreError::KeyNotFound => Self::NoSuchKey,
            StoreError::IndexOutOfRange => Self::IndexOutOfRange,
            StoreError::WrongType => Self::WrongType,
            StoreError::BusyKey => Self::BusyKey,
            StoreError::DbIndexOutOfRange => Self::DbIndexOutOfRange,
            StoreError::SameObject => Self::SameObject,
            StoreError::Payload(_) => Self::BadPayload,
        }
    }
}

impl From<RangeParseError> for CommandError {
    fn from(value: RangeParseError) -> Self {
        match value {
            RangeParseError::NotAFloat => Self::RangeNotAFloat,
            RangeParseError::InvalidLexItem => Self::InvalidLexRange,
        }
    }
}

macro_rules! command_table {
    ($($id:ident => $name:literal),* $(,)?) => {
        /// Every command the engine executes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandId {
            $($id),*
        }

        impl CommandId {
            pub const ALL: &'static [CommandId] = &[$(CommandId::$id),*];

            /// Lowercase command name, as used in arity errors.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(CommandId::$id => $name),*
                }
            }
        }
    };
}

command_table! {
    Ping => "ping",
    Echo => "echo",
    Time => "time",
    Select => "select",
    Swapdb => "swapdb",
    Dbsize => "dbsize",
    Flushdb => "flushdb",
    Flushall => "flushall",
    Multi => "multi",
    Exec => "exec",
    Discard => "discard",
    Del => "del",
    Unlink => "unlink",
    Exists => "exists",
    Type => "type",
    Keys => "keys",
    Randomkey => "randomkey",
    Rename => "rename",
    Renamenx => "renamenx",
    Move => "move",
    Touch => "touch",
    Expire => "expire",
    Pexpire => "pexpire",
    Expireat => "expireat",
    Pexpireat => "pexpireat",
    Ttl => "ttl",
    Pttl => "pttl",
    Persist => "persist",
    Dump => "dump",
    Restore => "restore",
    Get => "get",
    Set => "set",
    Setnx => "setnx",
    Setex => "setex",
    Psetex => "psetex",
    Getset => "getset",
    Getdel => "getdel",
    Mget => "mget",
    Mset => "mset",
    Msetnx => "msetnx",
    Append => "append",
    Strlen => "strlen",
    Getrange => "getrange",
    Setrange => "setrange",
    Incr => "incr",
    Decr => "decr",
    Incrby => "incrby",
    Decrby => "decrby",
    Incrbyfloat => "incrbyfloat",
    Setbit => "setbit",
    Getbit => "getbit",
    Bitcount => "bitcount",
    Bitop => "bitop",
    Hset => "hset",
    Hsetnx => "hsetnx",
    Hmset => "hmset",
    Hget => "hget",
    Hmget => "hmget",
    Hdel => "hdel",
    Hexists => "hexists",
    Hlen => "hlen",
    Hkeys => "hkeys",
    Hvals => "hvals",
    Hgetall => "hgetall",
    Hstrlen => "hstrlen",
    Hincrby => "hincrby",
    Hincrbyfloat => "hincrbyfloat",
    Lpush => "lpush",
    Rpush => "rpush",
    Lpushx => "lpushx",
    Rpushx => "rpushx",
    Lpop => "lpop",
    Rpop => "rpop",
    Llen => "llen",
    Lrange => "lrange",
    Lindex => "lindex",
    Linsert => "linsert",
    Lrem => "lrem",
    Lset => "lset",
    Ltrim => "ltrim",
    Rpoplpush => "rpoplpush",
    Sadd => "sadd",
    Srem => "srem",
    Smembers => "smembers",
    Scard => "scard",
    Sismember => "sismember",
    Spop => "spop",
    Srandmember => "srandmember",
    Smove => "smove",
    Sdiff => "sdiff",
    Sinter => "sinter",
    Sunion => "sunion",
    Sdiffstore => "sdiffstore",
    Sinterstore => "sinterstore",
    Sunionstore => "sunionstore",
    Zadd => "zadd",
    Zincrby => "zincrby",
    Zrem => "zrem",
    Zcard => "zcard",
    Zscore => "zscore",
    Zrank => "zrank",
    Zrevrank => "zrevrank",
    Zrange => "zrange",
    Zrevrange => "zrevrange",
    Zrangebyscore => "zrangebyscore",
    Zrevrangebyscore => "zrevrangebyscore",
    Zrangebylex => "zrangebylex",
    Zrevrangebylex => "zrevrangebylex",
    Zcount => "zcount",
    Zlexcount => "zlexcount",
    Zremrangebyscore => "zremrangebyscore",
    Zremrangebylex => "zremrangebylex",
    Zremrangebyrank => "zremrangebyrank",
    Geoadd => "geoadd",
    Geodist => "geodist",
    Geohash => "geohash",
    Geopos => "geopos",
}

/// Commands recognized by name but not implemented by the engine.
pub const UNSUPPORTED_COMMANDS: &[&str] = &[
    "georadius",
    "georadiusbymember",
    "georadius_ro",
    "georadiusbymember_ro",
    "geosearch",
    "geosearchstore",
    "subscribe",
    "unsubscribe",
    "psubscribe",
    "punsubscribe",
    "publish",
    "pubsub",
    "eval",
    "evalsha",
    "script",
    "function",
    "fcall",
    "cluster",
    "readonly",
    "readwrite",
    "replicaof",
    "slaveof",
    "sync",
    "psync",
    "wait",
    "info",
    "config",
    "client",
    "object",
    "debug",
    "monitor",
    "slowlog",
    "latency",
    "memory",
    "command",
    "shutdown",
    "save",
    "bgsave",
    "bgrewriteaof",
    "lastsave",
    "pfadd",
    "pfcount",
    "pfmerge",
    "scan",
    "sscan",
    "hscan",
    "zscan",
    "blpop",
    "brpop",
    "brpoplpush",
    "blmove",
    "bzpopmin",
    "bzpopmax",
    "watch",
    "unwatch",
    "auth",
    "hello",
    "migrate",
];

#[must_use]
pub fn classify_command(raw: &[u8]) -> Option<CommandId> {
    CommandId::ALL
        .iter()
        .copied()
        .find(|id| eq_ascii_command(raw, id.name()))
}

#[must_use]
pub fn is_unsupported_command(raw: &[u8]) -> bool {
    UNSUPPORTED_COMMANDS
        .iter()
        .any(|name| eq_ascii_command(raw, name))
}

/// Executes one command against the current database of `dbs`.
pub fn dispatch_argv(
    argv: &[Vec<u8>],
    dbs: &mut Databases,
    rng: &mut StdRng,
    now_ms: u64,
) -> Result<Reply, CommandError> {
    let Some(raw_cmd) = argv.first() else {
        return Err(CommandError::UnknownCommand(String::new()));
    };
    let Some(id) = classify_command(raw_cmd) else {
        if is_unsupported_command(raw_cmd) {
            return Err(CommandError::Unsupported);
        }
        return Err(CommandError::UnknownCommand(
            String::from_utf8_lossy(raw_cmd).into_owned(),
        ));
    };

    match id {
        CommandId::Ping => return keyspace::ping(argv),
        CommandId::Echo => return keyspace::echo(argv),
        CommandId::Time => return keyspace::time(argv, now_ms),
        CommandId::Select => return keyspace::select(argv, dbs),
        CommandId::Swapdb => return keyspace::swapdb(argv, dbs),
        CommandId::Flushdb => return keyspace::flushdb(argv, dbs),
        CommandId::Flushall => return keyspace::flushall(argv, dbs),
        CommandId::Move => return keyspace::move_cmd(argv, dbs, now_ms),
        CommandId::Multi => return Err(CommandError::NestedMulti),
        CommandId::Exec => return Err(CommandError::ExecWithoutMulti),
        CommandId::Discard => return Err(CommandError::DiscardWithoutMulti),
        _ => {}
    }

    let store = dbs.current();
    match id {
        CommandId::Dbsize => keyspace::dbsize(argv, store, now_ms),
        CommandId::Del | CommandId::Unlink => keyspace::del(argv, store, now_ms, id.name()),
        CommandId::Exists => keyspace::exists(argv, store, now_ms),
        CommandId::Type => keyspace::type_cmd(argv, store, now_ms),
        CommandId::Keys => keyspace::keys(argv, store, now_ms),
        CommandId::Randomkey => keyspace::randomkey(argv, store, rng, now_ms),
        CommandId::Rename => keyspace::rename(argv, store, now_ms),
        CommandId::Renamenx => keyspace::renamenx(argv, store, now_ms),
        CommandId::Touch => keyspace::touch(argv, store, now_ms),
        CommandId::Expire => keyspace::expire(argv, store, now_ms),
        CommandId::Pexpire => keyspace::pexpire(argv, store, now_ms),
        CommandId::Expireat => keyspace::expireat(argv, store, now_ms, "expireat"),
        CommandId::Pexpireat => keyspace::expireat(argv, store, now_ms, "pexpireat"),
        CommandId::Ttl => keyspace::ttl(argv, store, now_ms),
        CommandId::Pttl => keyspace::pttl(argv, store, now_ms),
        CommandId::Persist => keyspace::persist(argv, store, now_ms),
        CommandId::Dump => keyspace::dump(argv, store, now_ms),
        CommandId::Restore => keyspace::restore(argv, store, now_ms),
        CommandId::Get => string::get(argv, store, now_ms),
        CommandId::Set => string::set(argv, store, now_ms),
        CommandId::Setnx => string::setnx(argv, store, now_ms),
        CommandId::Setex => string::setex(argv, store, now_ms, false),
        CommandId::Psetex => string::setex(argv, store, now_ms, true),
        CommandId::Getset => string::getset(argv, store, now_ms),
        CommandId::Getdel => string::getdel(argv, store, now_ms),
        CommandId::Mget => string::mget(argv, store, now_ms),
        CommandId::Mset => string::mset(argv, store, now_ms),
        CommandId::Msetnx => string::msetnx(argv, store, now_ms),
        CommandId::Append => string::append(argv, store, now_ms),
        CommandId::Strlen => string::strlen(argv, store, now_ms),
        CommandId::Getrange => string::getrange(argv, store, now_ms),
        CommandId::Setrange => string::setrange(argv, store, now_ms),
        CommandId::Incr => string::incr_by_constant(argv, store, now_ms, 1, "incr"),
        CommandId::Decr => string::incr_by_constant(argv, store, now_ms, -1, "decr"),
        CommandId::Incrby => string::incrby(argv, store, now_ms, false),
        CommandId::Decrby => string::incrby(argv, store, now_ms, true),
        CommandId::Incrbyfloat => string::incrbyfloat(argv, store, now_ms),
        CommandId::Setbit => string::setbit(argv, store, now_ms),
        CommandId::Getbit => string::getbit(argv, store, now_ms),
        CommandId::Bitcount => string::bitcount(argv, store, now_ms),
        CommandId::Bitop => string::bitop(argv, store, now_ms),
        CommandId::Hset => hash::hset(argv, store, now_ms, "hset"),
        CommandId::Hmset => hash::hset(argv, store, now_ms, "hmset"),
        CommandId::Hsetnx => hash::hsetnx(argv, store, now_ms),
        CommandId::Hget => hash::hget(argv, store, now_ms),
        CommandId::Hmget => hash::hmget(argv, store, now_ms),
        CommandId::Hdel => hash::hdel(argv, store, now_ms),
        CommandId::Hexists => hash::hexists(argv, store, now_ms),
        CommandId::Hlen => hash::hlen(argv, store, now_ms),
        CommandId::Hkeys => hash::hkeys(argv, store, now_ms),
        CommandId::Hvals => hash::hvals(argv, store, now_ms),
        CommandId::Hgetall => hash::hgetall(argv, store, now_ms),
        CommandId::Hstrlen => hash::hstrlen(argv, store, now_ms),
        CommandId::Hincrby => hash::hincrby(argv, store, now_ms),
        CommandId::Hincrbyfloat => hash::hincrbyfloat(argv, store, now_ms),
        CommandId::Lpush => list::push(argv, store, now_ms, id),
        CommandId::Rpush => list::push(argv, store, now_ms, id),
        CommandId::Lpushx => list::push(argv, store, now_ms, id),
        CommandId::Rpushx => list::push(argv, store, now_ms, id),
        CommandId::Lpop => list::pop(argv, store, now_ms, id),
        CommandId::Rpop => list::pop(argv, store, now_ms, id),
        CommandId::Llen => list::llen(argv, store, now_ms),
        CommandId::Lrange => list::lrange(argv, store, now_ms),
        CommandId::Lindex => list::lindex(argv, store, now_ms),
        CommandId::Linsert => list::linsert(argv, store, now_ms),
        CommandId::Lrem => list::lrem(argv, store, now_ms),
        CommandId::Lset => list::lset(argv, store, now_ms),
        CommandId::Ltrim => list::ltrim(argv, store, now_ms),
        CommandId::Rpoplpush => list::rpoplpush(argv, store, now_ms),
        CommandId::Sadd => set::sadd(argv, store, now_ms),
        CommandId::Srem => set::srem(argv, store, now_ms),
        CommandId::Smembers => set::smembers(argv, store, now_ms),
        CommandId::Scard => set::scard(argv, store, now_ms),
        CommandId::Sismember => set::sismember(argv, store, now_ms),
        CommandId::Spop => set::spop(argv, store, rng, now_ms),
        CommandId::Srandmember => set::srandmember(argv, store, rng, now_ms),
        CommandId::Smove => set::smove(argv, store, now_ms),
        CommandId::Sdiff | CommandId::Sinter | CommandId::Sunion => {
            set::algebra(argv, store, now_ms, id)
        }
        CommandId::Sdiffstore | CommandId::Sinterstore | CommandId::Sunionstore => {
            set::algebra_store(argv, store, now_ms, id)
        }
        CommandId::Zadd => zset::zadd(argv, store, now_ms),
        CommandId::Zincrby => zset::zincrby(argv, store, now_ms),
        CommandId::Zrem => zset::zrem(argv, store, now_ms),
        CommandId::Zcard => zset::zcard(argv, store, now_ms),
        CommandId::Zscore => zset::zscore(argv, store, now_ms),
        CommandId::Zrank => zset::zrank(argv, store, now_ms, false),
        CommandId::Zrevrank => zset::zrank(argv, store, now_ms, true),
        CommandId::Zrange => zset::zrange(argv, store, now_ms, false),
        CommandId::Zrevrange => zset::zrange(argv, store, now_ms, true),
        CommandId::Zrangebyscore => zset::zrangebyscore(argv, store, now_ms, false),
        CommandId::Zrevrangebyscore => zset::zrangebyscore(argv, store, now_ms, true),
        CommandId::Zrangebylex => zset::zrangebylex(argv, store, now_ms, false),
        CommandId::Zrevrangebylex => zset::zrangebylex(argv, store, now_ms, true),
        CommandId::Zcount => zset::zcount(argv, store, now_ms),
        CommandId::Zlexcount => zset::zlexcount(argv, store, now_ms),
        CommandId::Zremrangebyscore => zset::zremrangebyscore(argv, store, now_ms),
        CommandId::Zremrangebylex => zset::zremrangebylex(argv, store, now_ms),
        CommandId::Zremrangebyrank => zset::zremrangebyrank(argv, store, now_ms),
        CommandId::Geoadd => geo::geoadd(argv, store, now_ms),
        CommandId::Geodist => geo::geodist(argv, store, now_ms),
        CommandId::Geohash => geo::geohash(argv, store, now_ms),
        CommandId::Geopos => geo::geopos(argv, store, now_ms),
        CommandId::Ping
        | CommandId::Echo
        | CommandId::Time
        | CommandId::Select
        | CommandId::Swapdb
        | CommandId::Flushdb
        | CommandId::Flushall
        | CommandId::Move
        | CommandId::Multi
        | CommandId::Exec
        | CommandId::Discard => Err(CommandError::UnknownCommand(id.name().to_string())),
    }
}

/// Case-insensitive comparison of a raw argument against a lowercase keyword.
#[inline]
pub(crate) fn eq_ascii_command(raw: &[u8], keyword: &str) -> bool {
    raw.eq_ignore_ascii_case(keyword.as_bytes())
}

pub(crate) fn expect_arity(
    argv: &[Vec<u8>],
    expected: usize,
    name: &'static str,
) -> Result<(), CommandError> {
    if argv.len() == expected {
        Ok(())
    } else {
        Err(CommandError::WrongArity(name))
    }
}

pub(crate) fn expect_min_arity(
    argv: &[Vec<u8>],
    min: usize,
    name: &'static str,
) -> Result<(), CommandError> {
    if argv.len() >= min {
        Ok(())
    } else {
        Err(CommandError::WrongArity(name))
    }
}

pub(crate) fn parse_i64_arg(arg: &[u8]) -> Result<i64, CommandError> {
    let text = std::str::from_utf8(arg).map_err(|_| CommandError::NotAnInteger)?;
    if text.starts_with('+') {
        return Err(CommandError::NotAnInteger);
    }
    text.parse::<i64>().map_err(|_| CommandError::NotAnInteger)
}

pub(crate) fn parse_f64_arg(arg: &[u8]) -> Result<f64, CommandError> {
    mr_store::parse_float(arg).ok_or(CommandError::NotAValidFloat)
}

/// Flattened `a b c d` into `[(a, b), (c, d)]`; `None` for an odd count.
pub(crate) fn pairs(args: &[Vec<u8>]) -> Option<Vec<(Vec<u8>, Vec<u8>)>> {
    if args.len() % 2 != 0 {
        return None;
    }
    Some(
        args.chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect(),
    )
}

pub(crate) fn score_reply(score: f64) -> Reply {
    Reply::bulk(format_float(score))
}
