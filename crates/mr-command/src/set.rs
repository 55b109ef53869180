use mr_protocol::Reply;
use mr_store::{SetAlgebra, Store};
use rand::rngs::StdRng;

use crate::{CommandError, CommandId, expect_arity, expect_min_arity, parse_i64_arg};

pub(crate) fn sadd(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 3, "sadd")?;
    Ok(Reply::integer(store.sadd(&argv[1], &argv[2..], now_ms)?))
}

pub(crate) fn srem(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 3, "srem")?;
    Ok(Reply::integer(store.srem(&argv[1], &argv[2..], now_ms)?))
}

pub(crate) fn smembers(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "smembers")?;
    Ok(Reply::bulk_array(store.smembers(&argv[1], now_ms)?))
}

pub(crate) fn scard(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "scard")?;
    Ok(Reply::integer(store.scard(&argv[1], now_ms)?))
}

pub(crate) fn sismember(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "sismember")?;
    Ok(Reply::boolean(store.sismember(&argv[1], &argv[2], now_ms)?))
}

/// `SPOP key [count]`. Without a count the reply is a single member or null.
pub(crate) fn spop(
    argv: &[Vec<u8>],
    store: &mut Store,
    rng: &mut StdRng,
    now_ms: u64,
) -> Result<Reply, CommandError> {
    match argv {
        [_, key] => {
            let popped = store.spop(key, 1, rng, now_ms)?;
            Ok(Reply::optional_bulk(popped.into_iter().next()))
        }
        [_, key, count] => {
            let count = parse_i64_arg(count)?;
            let count = usize::try_from(count).map_err(|_| CommandError::NegativeCount)?;
            Ok(Reply::bulk_array(store.spop(key, count, rng, now_ms)?))
        }
        _ => Err(CommandError::WrongArity("spop")),
    }
}

/// `SRANDMEMBER key [count]`; a negative count draws with replacement.
pub(crate) fn srandmember(
    argv: &[Vec<u8>],
    store: &mut Store,
    rng: &mut StdRng,
    now_ms: u64,
) -> Result<Reply, CommandError> {
    match argv {
        [_, key] => {
            let drawn = store.srandmember(key, 1, rng, now_ms)?;
            Ok(Reply::optional_bulk(drawn.into_iter().next()))
        }
        [_, key, count] => {
            let count = parse_i64_arg(count)?;
            Ok(Reply::bulk_array(store.srandmember(key, count, rng, now_ms)?))
        }
        _ => Err(CommandError::WrongArity("srandmember")),
    }
}

pub(crate) fn smove(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "smove")?;
    Ok(Reply::boolean(store.smove(&argv[1], &argv[2], &argv[3], now_ms)?))
}

fn algebra_for(id: CommandId) -> SetAlgebra {
    match id {
        CommandId::Sinter | CommandId::Sinterstore => SetAlgebra::Intersection,
        CommandId::Sdiff | CommandId::Sdiffstore => SetAlgebra::Difference,
        _ => SetAlgebra::Union,
    }
}

/// `SDIFF`, `SINTER` and `SUNION`.
pub(crate) fn algebra(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    id: CommandId,
) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 2, id.name())?;
    Ok(Reply::bulk_array(store.set_algebra(algebra_for(id), &argv[1..], now_ms)?))
}

/// The `*STORE` variants write into `argv[1]` and return its cardinality.
pub(crate) fn algebra_store(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    id: CommandId,
) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 3, id.name())?;
    let len = store.set_algebra_store(algebra_for(id), &argv[1], &argv[2..], now_ms)?;
    Ok(Reply::integer(len))
}
