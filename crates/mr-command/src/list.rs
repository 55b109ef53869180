use mr_protocol::Reply;
use mr_store::{InsertPosition, ListEnd, Store};

use crate::{CommandError, CommandId, eq_ascii_command, expect_arity, expect_min_arity, parse_i64_arg};

/// `LPUSH`, `RPUSH` and their `X` variants that never create the key.
pub(crate) fn push(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    id: CommandId,
) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 3, id.name())?;
    let (end, only_if_exists) = match id {
        CommandId::Lpush => (ListEnd::Head, false),
        CommandId::Lpushx => (ListEnd::Head, true),
        CommandId::Rpushx => (ListEnd::Tail, true),
        _ => (ListEnd::Tail, false),
    };
    let len = store.push(&argv[1], &argv[2..], end, only_if_exists, now_ms)?;
    Ok(Reply::integer(len))
}

/// `LPOP key [count]` and `RPOP key [count]`. With a count the reply is an
/// array, or a null array for a missing key.
pub(crate) fn pop(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    id: CommandId,
) -> Result<Reply, CommandError> {
    let end = if id == CommandId::Lpop { ListEnd::Head } else { ListEnd::Tail };
    match argv {
        [_, key] => Ok(Reply::optional_bulk(store.pop(key, end, now_ms)?)),
        [_, key, count] => {
            let count = parse_i64_arg(count)?;
            let count = usize::try_from(count).map_err(|_| CommandError::NegativeCount)?;
            if store.llen(key, now_ms)? == 0 {
                return Ok(Reply::null_array());
            }
            let mut popped = Vec::new();
            while popped.len() < count {
                match store.pop(key, end, now_ms)? {
                    Some(item) => popped.push(item),
                    None => break,
                }
            }
            Ok(Reply::bulk_array(popped))
        }
        _ => Err(CommandError::WrongArity(id.name())),
    }
}

pub(crate) fn llen(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "llen")?;
    Ok(Reply::integer(store.llen(&argv[1], now_ms)?))
}

pub(crate) fn lrange(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "lrange")?;
    let start = parse_i64_arg(&argv[2])?;
    let stop = parse_i64_arg(&argv[3])?;
    Ok(Reply::bulk_array(store.lrange(&argv[1], start, stop, now_ms)?))
}

pub(crate) fn lindex(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "lindex")?;
    let index = parse_i64_arg(&argv[2])?;
    Ok(Reply::optional_bulk(store.lindex(&argv[1], index, now_ms)?))
}

/// `LINSERT key BEFORE|AFTER pivot element`.
pub(crate) fn linsert(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 5, "linsert")?;
    let position = if eq_ascii_command(&argv[2], "before") {
        InsertPosition::Before
    } else if eq_ascii_command(&argv[2], "after") {
        InsertPosition::After
    } else {
        return Err(CommandError::SyntaxError);
    };
    let len = store.linsert(&argv[1], position, &argv[3], argv[4].clone(), now_ms)?;
    Ok(Reply::Integer(len))
}

pub(crate) fn lrem(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "lrem")?;
    let count = parse_i64_arg(&argv[2])?;
    Ok(Reply::integer(store.lrem(&argv[1], count, &argv[3], now_ms)?))
}

pub(crate) fn lset(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "lset")?;
    let index = parse_i64_arg(&argv[2])?;
    store.lset(&argv[1], index, argv[3].clone(), now_ms)?;
    Ok(Reply::ok())
}

pub(crate) fn ltrim(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "ltrim")?;
    let start = parse_i64_arg(&argv[2])?;
    let stop = parse_i64_arg(&argv[3])?;
    store.ltrim(&argv[1], start, stop, now_ms)?;
    Ok(Reply::ok())
}

pub(crate) fn rpoplpush(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "rpoplpush")?;
    Ok(Reply::optional_bulk(store.rpoplpush(&argv[1], &argv[2], now_ms)?))
}
