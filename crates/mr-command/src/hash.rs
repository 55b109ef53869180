use mr_protocol::Reply;
use mr_store::{Store, format_float};

use crate::{
    CommandError, expect_arity, expect_min_arity, pairs, parse_f64_arg, parse_i64_arg,
};

/// `HSET` and `HMSET`. `HSET` answers with the number of new fields,
/// `HMSET` with `OK`.
pub(crate) fn hset(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    name: &'static str,
) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 4, name)?;
    let pairs = pairs(&argv[2..]).ok_or(CommandError::WrongArity(name))?;
    let added = store.hset(&argv[1], &pairs, now_ms)?;
    if name == "hmset" {
        Ok(Reply::ok())
    } else {
        Ok(Reply::integer(added))
    }
}

pub(crate) fn hsetnx(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "hsetnx")?;
    Ok(Reply::boolean(store.hsetnx(&argv[1], &argv[2], &argv[3], now_ms)?))
}

pub(crate) fn hget(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "hget")?;
    Ok(Reply::optional_bulk(store.hget(&argv[1], &argv[2], now_ms)?))
}

pub(crate) fn hmget(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 3, "hmget")?;
    let values = store.hmget(&argv[1], &argv[2..], now_ms)?;
    Ok(Reply::array(values.into_iter().map(Reply::optional_bulk).collect()))
}

pub(crate) fn hdel(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 3, "hdel")?;
    Ok(Reply::integer(store.hdel(&argv[1], &argv[2..], now_ms)?))
}

pub(crate) fn hexists(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "hexists")?;
    Ok(Reply::boolean(store.hexists(&argv[1], &argv[2], now_ms)?))
}

pub(crate) fn hlen(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "hlen")?;
    Ok(Reply::integer(store.hlen(&argv[1], now_ms)?))
}

pub(crate) fn hstrlen(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "hstrlen")?;
    Ok(Reply::integer(store.hstrlen(&argv[1], &argv[2], now_ms)?))
}

pub(crate) fn hkeys(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "hkeys")?;
    Ok(Reply::bulk_array(store.hkeys(&argv[1], now_ms)?))
}

pub(crate) fn hvals(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "hvals")?;
    Ok(Reply::bulk_array(store.hvals(&argv[1], now_ms)?))
}

/// Flat `field value field value ...` array in field byte order.
pub(crate) fn hgetall(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "hgetall")?;
    let flat = store
        .hgetall(&argv[1], now_ms)?
        .into_iter()
        .flat_map(|(field, value)| [field, value]);
    Ok(Reply::bulk_array(flat))
}

pub(crate) fn hincrby(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "hincrby")?;
    let delta = parse_i64_arg(&argv[3])?;
    Ok(Reply::Integer(store.hincrby(&argv[1], &argv[2], delta, now_ms)?))
}

pub(crate) fn hincrbyfloat(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "hincrbyfloat")?;
    let delta = parse_f64_arg(&argv[3])?;
    let next = store.hincrbyfloat(&argv[1], &argv[2], delta, now_ms)?;
    Ok(Reply::bulk(format_float(next)))
}
