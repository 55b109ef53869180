//! String, counter and bitmap commands.

use mr_protocol::Reply;
use mr_store::{BitOp, SetCondition, SetExpiry, SetOptions, Store, format_float};

use crate::{
    CommandError, eq_ascii_command, expect_arity, expect_min_arity, pairs, parse_f64_arg,
    parse_i64_arg,
};

/// Largest string `SETRANGE` may grow, matching the server's 512MB cap.
const MAX_STRING_LEN: usize = 512 * 1024 * 1024;
/// Bit offsets must address a string no longer than [`MAX_STRING_LEN`].
const MAX_BIT_OFFSET: i64 = 1 << 32;

pub(crate) fn get(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "get")?;
    Ok(Reply::optional_bulk(store.get(&argv[1], now_ms)?))
}

/// Relative TTL argument of `EX`/`PX`/`SETEX`/`PSETEX`, turned into an
/// absolute deadline.
fn relative_deadline(
    raw: &[u8],
    unit_ms: u64,
    now_ms: u64,
    name: &'static str,
) -> Result<u64, CommandError> {
    let amount = parse_i64_arg(raw)?;
    if amount <= 0 {
        return Err(CommandError::InvalidExpireTime(name));
    }
    amount
        .unsigned_abs()
        .checked_mul(unit_ms)
        .and_then(|ttl| now_ms.checked_add(ttl))
        .ok_or(CommandError::InvalidExpireTime(name))
}

fn absolute_deadline(raw: &[u8], unit_ms: u64, name: &'static str) -> Result<u64, CommandError> {
    let at = parse_i64_arg(raw)?;
    if at <= 0 {
        return Err(CommandError::InvalidExpireTime(name));
    }
    at.unsigned_abs()
        .checked_mul(unit_ms)
        .ok_or(CommandError::InvalidExpireTime(name))
}

/// `SET key value [EX s|PX ms|EXAT s|PXAT ms|KEEPTTL] [NX|XX] [GET]`.
pub(crate) fn set(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 3, "set")?;
    let mut options = SetOptions::default();
    let mut expiry_given = false;
    let mut nx = false;
    let mut xx = false;

    let mut args = argv[3..].iter();
    while let Some(option) = args.next() {
        let expiry_unit = if eq_ascii_command(option, "ex") {
            Some((1000, false))
        } else if eq_ascii_command(option, "px") {
            Some((1, false))
        } else if eq_ascii_command(option, "exat") {
            Some((1000, true))
        } else if eq_ascii_command(option, "pxat") {
            Some((1, true))
        } else {
            None
        };
        if let Some((unit_ms, absolute)) = expiry_unit {
            if expiry_given {
                return Err(CommandError::SyntaxError);
            }
            let raw = args.next().ok_or(CommandError::SyntaxError)?;
            let when_ms = if absolute {
                absolute_deadline(raw, unit_ms, "set")?
            } else {
                relative_deadline(raw, unit_ms, now_ms, "set")?
            };
            options.expiry = SetExpiry::At(when_ms);
            expiry_given = true;
        } else if eq_ascii_command(option, "keepttl") {
            if expiry_given {
                return Err(CommandError::SyntaxError);
            }
            options.expiry = SetExpiry::KeepTtl;
            expiry_given = true;
        } else if eq_ascii_command(option, "nx") {
            nx = true;
        } else if eq_ascii_command(option, "xx") {
            xx = true;
        } else if eq_ascii_command(option, "get") {
            options.return_previous = true;
        } else {
            return Err(CommandError::SyntaxError);
        }
    }
    options.condition = match (nx, xx) {
        (true, true) => return Err(CommandError::SyntaxError),
        (true, false) => SetCondition::IfAbsent,
        (false, true) => SetCondition::IfPresent,
        (false, false) => SetCondition::Always,
    };

    let outcome = store.set_with_options(&argv[1], argv[2].clone(), options, now_ms)?;
    if options.return_previous {
        Ok(Reply::optional_bulk(outcome.previous))
    } else if outcome.applied {
        Ok(Reply::ok())
    } else {
        Ok(Reply::null_bulk())
    }
}

pub(crate) fn setnx(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "setnx")?;
    Ok(Reply::boolean(store.setnx(&argv[1], argv[2].clone(), now_ms)?))
}

/// `SETEX key seconds value` and `PSETEX key millis value`.
pub(crate) fn setex(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    millis: bool,
) -> Result<Reply, CommandError> {
    let (name, unit_ms) = if millis { ("psetex", 1) } else { ("setex", 1000) };
    expect_arity(argv, 4, name)?;
    let when_ms = relative_deadline(&argv[2], unit_ms, now_ms, name)?;
    let options = SetOptions {
        expiry: SetExpiry::At(when_ms),
        ..SetOptions::default()
    };
    store.set_with_options(&argv[1], argv[3].clone(), options, now_ms)?;
    Ok(Reply::ok())
}

pub(crate) fn getset(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "getset")?;
    Ok(Reply::optional_bulk(store.getset(&argv[1], argv[2].clone(), now_ms)?))
}

pub(crate) fn getdel(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "getdel")?;
    Ok(Reply::optional_bulk(store.getdel(&argv[1], now_ms)?))
}

pub(crate) fn mget(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 2, "mget")?;
    let values = store.mget(&argv[1..], now_ms);
    Ok(Reply::array(values.into_iter().map(Reply::optional_bulk).collect()))
}

pub(crate) fn mset(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 3, "mset")?;
    let pairs = pairs(&argv[1..]).ok_or(CommandError::WrongArity("mset"))?;
    store.mset(&pairs, now_ms)?;
    Ok(Reply::ok())
}

pub(crate) fn msetnx(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 3, "msetnx")?;
    let pairs = pairs(&argv[1..]).ok_or(CommandError::WrongArity("msetnx"))?;
    Ok(Reply::boolean(store.msetnx(&pairs, now_ms)))
}

pub(crate) fn append(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "append")?;
    Ok(Reply::integer(store.append(&argv[1], &argv[2], now_ms)?))
}

pub(crate) fn strlen(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "strlen")?;
    Ok(Reply::integer(store.strlen(&argv[1], now_ms)?))
}

pub(crate) fn getrange(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "getrange")?;
    let start = parse_i64_arg(&argv[2])?;
    let end = parse_i64_arg(&argv[3])?;
    Ok(Reply::bulk(store.getrange(&argv[1], start, end, now_ms)?))
}

pub(crate) fn setrange(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "setrange")?;
    let offset = parse_i64_arg(&argv[2])?;
    let offset = usize::try_from(offset).map_err(|_| CommandError::OffsetOutOfRange)?;
    if offset.saturating_add(argv[3].len()) > MAX_STRING_LEN {
        return Err(CommandError::OffsetOutOfRange);
    }
    Ok(Reply::integer(store.setrange(&argv[1], offset, &argv[3], now_ms)?))
}

/// `INCR` and `DECR`.
pub(crate) fn incr_by_constant(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    delta: i64,
    name: &'static str,
) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, name)?;
    Ok(Reply::Integer(store.incrby(&argv[1], delta, now_ms)?))
}

/// `INCRBY` and `DECRBY`.
pub(crate) fn incrby(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    negate: bool,
) -> Result<Reply, CommandError> {
    let name = if negate { "decrby" } else { "incrby" };
    expect_arity(argv, 3, name)?;
    let mut delta = parse_i64_arg(&argv[2])?;
    if negate {
        delta = delta.checked_neg().ok_or(CommandError::IntegerOverflow)?;
    }
    Ok(Reply::Integer(store.incrby(&argv[1], delta, now_ms)?))
}

pub(crate) fn incrbyfloat(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "incrbyfloat")?;
    let delta = parse_f64_arg(&argv[2])?;
    let next = store.incrbyfloat(&argv[1], delta, now_ms)?;
    Ok(Reply::bulk(format_float(next)))
}

fn parse_bit_offset(raw: &[u8]) -> Option<usize> {
    parse_i64_arg(raw)
        .ok()
        .filter(|offset| (0..MAX_BIT_OFFSET).contains(offset))
        .and_then(|offset| usize::try_from(offset).ok())
}

pub(crate) fn setbit(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "setbit")?;
    let offset = parse_bit_offset(&argv[2]).ok_or(CommandError::BitOffsetOutOfRange)?;
    let bit = match argv[3].as_slice() {
        b"0" => false,
        b"1" => true,
        _ => return Err(CommandError::BitValueOutOfRange),
    };
    Ok(Reply::boolean(store.setbit(&argv[1], offset, bit, now_ms)?))
}

/// An offset that does not parse reads as a clear bit.
pub(crate) fn getbit(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "getbit")?;
    let Some(offset) = parse_bit_offset(&argv[2]) else {
        return Ok(Reply::Integer(0));
    };
    Ok(Reply::boolean(store.getbit(&argv[1], offset, now_ms)?))
}

pub(crate) fn bitcount(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 2, "bitcount")?;
    let window = match &argv[2..] {
        [] => None,
        [start, end] => Some((parse_i64_arg(start)?, parse_i64_arg(end)?)),
        _ => return Err(CommandError::SyntaxError),
    };
    Ok(Reply::integer(store.bitcount(&argv[1], window, now_ms)?))
}

/// `BITOP AND|OR|XOR|NOT destkey srckey [srckey ...]`.
pub(crate) fn bitop(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 4, "bitop")?;
    let op = if eq_ascii_command(&argv[1], "and") {
        BitOp::And
    } else if eq_ascii_command(&argv[1], "or") {
        BitOp::Or
    } else if eq_ascii_command(&argv[1], "xor") {
        BitOp::Xor
    } else if eq_ascii_command(&argv[1], "not") {
        BitOp::Not
    } else {
        return Err(CommandError::SyntaxError);
    };
    let sources = &argv[3..];
    if op == BitOp::Not && sources.len() != 1 {
        return Err(CommandError::BitopNotArity);
    }
    Ok(Reply::integer(store.bitop(op, &argv[2], sources, now_ms)?))
}

#[cfg(test)]
mod tests {
    use mr_protocol::Reply;

    use crate::tests::Harness;
    use crate::{CommandError, ErrorKind};

    #[test]
    fn set_options() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&["set", "k", "v1", "NX"]), Reply::ok());
        assert_eq!(h.ok(&["set", "k", "v2", "nx"]), Reply::null_bulk());
        assert_eq!(h.ok(&["get", "k"]), Reply::bulk("v1"));
        assert_eq!(h.ok(&["set", "missing", "v", "XX"]), Reply::null_bulk());
        assert_eq!(h.ok(&["exists", "missing"]), Reply::Integer(0));
        assert_eq!(h.ok(&["set", "k", "v3", "GET"]), Reply::bulk("v1"));
        assert_eq!(h.run(&["set", "k", "v", "NX", "XX"]), Err(CommandError::SyntaxError));
        assert_eq!(
            h.run(&["set", "k", "v", "EX", "1", "PX", "5"]),
            Err(CommandError::SyntaxError)
        );
        assert_eq!(h.run(&["set", "k", "v", "BOGUS"]), Err(CommandError::SyntaxError));
        assert_eq!(h.run(&["set", "k", "v", "EX"]), Err(CommandError::SyntaxError));
    }

    #[test]
    fn set_expiry_variants() {
        let mut h = Harness::new();
        h.ok(&["set", "k", "v", "EX", "10"]);
        assert_eq!(h.ok(&["pttl", "k"]), Reply::Integer(10_000));
        h.ok(&["set", "k", "v2", "KEEPTTL"]);
        assert_eq!(h.ok(&["pttl", "k"]), Reply::Integer(10_000));
        h.ok(&["set", "k", "v3"]);
        assert_eq!(h.ok(&["pttl", "k"]), Reply::Integer(-1));
        h.ok(&["set", "k", "v", "PX", "250"]);
        assert_eq!(h.ok(&["pttl", "k"]), Reply::Integer(250));
        assert_eq!(
            h.run(&["set", "k", "v", "EX", "0"]),
            Err(CommandError::InvalidExpireTime("set"))
        );
        assert_eq!(
            h.run(&["set", "k", "v", "PX", "-5"]),
            Err(CommandError::InvalidExpireTime("set"))
        );
        assert_eq!(
            h.run(&["set", "k", "v", "EX", "ten"]).map_err(|e| e.kind()),
            Err(ErrorKind::NotAnInteger)
        );
        h.ok(&["setex", "s", "3", "v"]);
        assert_eq!(h.ok(&["ttl", "s"]), Reply::Integer(3));
        h.ok(&["psetex", "p", "1500", "v"]);
        assert_eq!(h.ok(&["pttl", "p"]), Reply::Integer(1_500));
        assert_eq!(
            h.run(&["setex", "s", "0", "v"]),
            Err(CommandError::InvalidExpireTime("setex"))
        );
    }

    #[test]
    fn wrong_type_reads_and_writes() {
        let mut h = Harness::new();
        h.ok(&["rpush", "l", "x"]);
        assert_eq!(h.run(&["get", "l"]), Err(CommandError::WrongType));
        assert_eq!(h.run(&["set", "l", "v"]), Err(CommandError::WrongType));
        assert_eq!(h.run(&["append", "l", "v"]), Err(CommandError::WrongType));
        assert_eq!(h.run(&["incr", "l"]), Err(CommandError::WrongType));
        assert_eq!(
            h.ok(&["mget", "l", "nope"]),
            Reply::array(vec![Reply::null_bulk(), Reply::null_bulk()])
        );
    }

    #[test]
    fn counters() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&["incr", "n"]), Reply::Integer(1));
        assert_eq!(h.ok(&["incrby", "n", "10"]), Reply::Integer(11));
        assert_eq!(h.ok(&["decr", "n"]), Reply::Integer(10));
        assert_eq!(h.ok(&["decrby", "n", "-5"]), Reply::Integer(15));
        h.ok(&["set", "word", "abc"]);
        assert_eq!(h.run(&["incr", "word"]), Err(CommandError::NotAnInteger));
        assert_eq!(h.run(&["incrby", "n", "1.5"]), Err(CommandError::NotAnInteger));
        h.ok(&["set", "big", &i64::MAX.to_string()]);
        assert_eq!(h.run(&["incr", "big"]), Err(CommandError::IntegerOverflow));
        assert_eq!(
            h.run(&["decrby", "n", &i64::MIN.to_string()]),
            Err(CommandError::IntegerOverflow)
        );
        assert_eq!(h.ok(&["incrbyfloat", "f", "1.5"]), Reply::bulk("1.5"));
        assert_eq!(h.ok(&["incrbyfloat", "f", "0.5"]), Reply::bulk("2"));
        assert_eq!(h.run(&["incrbyfloat", "f", "x"]), Err(CommandError::NotAValidFloat));
        assert_eq!(h.run(&["incrbyfloat", "f", "inf"]), Err(CommandError::NotAValidFloat));
        assert_eq!(h.ok(&["get", "f"]), Reply::bulk("2"));
    }

    #[test]
    fn counter_keeps_ttl() {
        let mut h = Harness::new();
        h.ok(&["set", "n", "1", "EX", "100"]);
        h.ok(&["incr", "n"]);
        assert_eq!(h.ok(&["ttl", "n"]), Reply::Integer(100));
    }

    #[test]
    fn multi_key_strings() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&["mset", "a", "1", "b", "2"]), Reply::ok());
        assert_eq!(
            h.ok(&["mget", "a", "missing", "b"]),
            Reply::array(vec![Reply::bulk("1"), Reply::null_bulk(), Reply::bulk("2")])
        );
        assert_eq!(h.ok(&["msetnx", "c", "3", "a", "9"]), Reply::Integer(0));
        assert_eq!(h.ok(&["exists", "c"]), Reply::Integer(0));
        assert_eq!(h.ok(&["msetnx", "c", "3", "d", "4"]), Reply::Integer(1));
        assert_eq!(h.run(&["msetnx", "x", "1", "y"]), Err(CommandError::WrongArity("msetnx")));
    }

    #[test]
    fn getset_getdel_and_ranges() {
        let mut h = Harness::new();
        h.ok(&["set", "k", "hello", "EX", "50"]);
        assert_eq!(h.ok(&["getset", "k", "world"]), Reply::bulk("hello"));
        assert_eq!(h.ok(&["ttl", "k"]), Reply::Integer(-1));
        assert_eq!(h.ok(&["append", "k", "!"]), Reply::Integer(6));
        assert_eq!(h.ok(&["strlen", "k"]), Reply::Integer(6));
        assert_eq!(h.ok(&["getrange", "k", "0", "-2"]), Reply::bulk("world"));
        assert_eq!(h.ok(&["getrange", "k", "10", "20"]), Reply::bulk(""));
        assert_eq!(h.ok(&["setrange", "k", "8", "xy"]), Reply::Integer(10));
        assert_eq!(h.ok(&["get", "k"]), Reply::bulk(b"world!\0\0xy".to_vec()));
        assert_eq!(h.run(&["setrange", "k", "-1", "x"]), Err(CommandError::OffsetOutOfRange));
        assert_eq!(h.ok(&["setrange", "empty", "3", ""]), Reply::Integer(0));
        assert_eq!(h.ok(&["exists", "empty"]), Reply::Integer(0));
        assert_eq!(h.ok(&["getdel", "k"]), Reply::bulk(b"world!\0\0xy".to_vec()));
        assert_eq!(h.ok(&["getdel", "k"]), Reply::null_bulk());
    }

    #[test]
    fn bits() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&["setbit", "b", "7", "1"]), Reply::Integer(0));
        assert_eq!(h.ok(&["setbit", "b", "7", "1"]), Reply::Integer(1));
        assert_eq!(h.ok(&["get", "b"]), Reply::bulk(vec![0x01]));
        assert_eq!(h.ok(&["getbit", "b", "7"]), Reply::Integer(1));
        assert_eq!(h.ok(&["getbit", "b", "100"]), Reply::Integer(0));
        assert_eq!(h.ok(&["getbit", "b", "-3"]), Reply::Integer(0));
        assert_eq!(h.run(&["setbit", "b", "-1", "1"]), Err(CommandError::BitOffsetOutOfRange));
        assert_eq!(
            h.run(&["setbit", "b", "4294967296", "1"]),
            Err(CommandError::BitOffsetOutOfRange)
        );
        assert_eq!(h.run(&["setbit", "b", "1", "2"]), Err(CommandError::BitValueOutOfRange));
        h.ok(&["set", "s", "foobar"]);
        assert_eq!(h.ok(&["bitcount", "s"]), Reply::Integer(26));
        assert_eq!(h.ok(&["bitcount", "s", "1", "1"]), Reply::Integer(6));
        assert_eq!(h.ok(&["bitcount", "s", "-2", "-1"]), Reply::Integer(7));
        assert_eq!(h.run(&["bitcount", "s", "1"]), Err(CommandError::SyntaxError));
    }

    #[test]
    fn bitop_combines_and_pads() {
        let mut h = Harness::new();
        h.ok(&["set", "a", "\u{7}"]);
        h.ok(&["set", "b", "\u{1}\u{1}"]);
        assert_eq!(h.ok(&["bitop", "OR", "dest", "a", "b"]), Reply::Integer(2));
        assert_eq!(h.ok(&["get", "dest"]), Reply::bulk(vec![0x07, 0x01]));
        assert_eq!(h.ok(&["bitop", "and", "dest", "a", "b"]), Reply::Integer(2));
        assert_eq!(h.ok(&["get", "dest"]), Reply::bulk(vec![0x01, 0x00]));
        assert_eq!(h.ok(&["bitop", "not", "dest", "a"]), Reply::Integer(1));
        assert_eq!(h.ok(&["get", "dest"]), Reply::bulk(vec![0xf8]));
        assert_eq!(h.run(&["bitop", "not", "dest", "a", "b"]), Err(CommandError::BitopNotArity));
        assert_eq!(h.run(&["bitop", "nand", "dest", "a"]), Err(CommandError::SyntaxError));
        assert_eq!(h.ok(&["bitop", "xor", "dest", "none1", "none2"]), Reply::Integer(0));
        assert_eq!(h.ok(&["exists", "dest"]), Reply::Integer(0));
        h.ok(&["rpush", "l", "x"]);
        assert_eq!(h.run(&["bitop", "or", "dest", "l"]), Err(CommandError::WrongType));
    }
}
