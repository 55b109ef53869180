//! Connection, database and generic key commands.

use mr_protocol::Reply;
use mr_store::{Databases, Store};
use rand::rngs::StdRng;

use crate::{CommandError, eq_ascii_command, expect_arity, expect_min_arity, parse_i64_arg};

pub(crate) fn ping(argv: &[Vec<u8>]) -> Result<Reply, CommandError> {
    match argv {
        [_] => Ok(Reply::SimpleString("PONG".to_string())),
        [_, message] => Ok(Reply::bulk(message.clone())),
        _ => Err(CommandError::WrongArity("ping")),
    }
}

pub(crate) fn echo(argv: &[Vec<u8>]) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "echo")?;
    Ok(Reply::bulk(argv[1].clone()))
}

/// `[seconds, microseconds]` of the client clock.
pub(crate) fn time(argv: &[Vec<u8>], now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 1, "time")?;
    let seconds = now_ms / 1000;
    let micros = (now_ms % 1000) * 1000;
    Ok(Reply::bulk_array([
        seconds.to_string().into_bytes(),
        micros.to_string().into_bytes(),
    ]))
}

pub(crate) fn select(argv: &[Vec<u8>], dbs: &mut Databases) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "select")?;
    let index = dbs.checked_index(parse_i64_arg(&argv[1])?)?;
    dbs.select(index)?;
    Ok(Reply::ok())
}

pub(crate) fn swapdb(argv: &[Vec<u8>], dbs: &mut Databases) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "swapdb")?;
    let first = parse_i64_arg(&argv[1]).map_err(|_| CommandError::DbIndexOutOfRange)?;
    let second = parse_i64_arg(&argv[2]).map_err(|_| CommandError::DbIndexOutOfRange)?;
    let first = dbs.checked_index(first)?;
    let second = dbs.checked_index(second)?;
    dbs.swap(first, second)?;
    Ok(Reply::ok())
}

/// Optional trailing `ASYNC`/`SYNC` accepted by the flush commands.
fn flush_mode_ok(argv: &[Vec<u8>], name: &'static str) -> Result<(), CommandError> {
    match argv {
        [_] => Ok(()),
        [_, mode] if eq_ascii_command(mode, "async") || eq_ascii_command(mode, "sync") => Ok(()),
        [_, _] => Err(CommandError::SyntaxError),
        _ => Err(CommandError::WrongArity(name)),
    }
}

pub(crate) fn flushall(argv: &[Vec<u8>], dbs: &mut Databases) -> Result<Reply, CommandError> {
    flush_mode_ok(argv, "flushall")?;
    dbs.flush_all();
    Ok(Reply::ok())
}

pub(crate) fn flushdb(argv: &[Vec<u8>], dbs: &mut Databases) -> Result<Reply, CommandError> {
    flush_mode_ok(argv, "flushdb")?;
    dbs.flush_current();
    Ok(Reply::ok())
}

pub(crate) fn move_cmd(
    argv: &[Vec<u8>],
    dbs: &mut Databases,
    now_ms: u64,
) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "move")?;
    let target = dbs.checked_index(parse_i64_arg(&argv[2])?)?;
    Ok(Reply::boolean(dbs.move_key(&argv[1], target, now_ms)?))
}

pub(crate) fn dbsize(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 1, "dbsize")?;
    Ok(Reply::integer(store.dbsize(now_ms)))
}

pub(crate) fn del(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    name: &'static str,
) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 2, name)?;
    Ok(Reply::integer(store.del(&argv[1..], now_ms)))
}

/// Counts every argument that names a live key, repeats included.
pub(crate) fn exists(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 2, "exists")?;
    let count = argv[1..]
        .iter()
        .filter(|key| store.exists(key, now_ms))
        .count();
    Ok(Reply::integer(count))
}

pub(crate) fn type_cmd(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "type")?;
    let name = store.key_type(&argv[1], now_ms).unwrap_or("none");
    Ok(Reply::SimpleString(name.to_string()))
}

pub(crate) fn keys(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "keys")?;
    Ok(Reply::bulk_array(store.keys_matching(&argv[1], now_ms)))
}

pub(crate) fn randomkey(
    argv: &[Vec<u8>],
    store: &mut Store,
    rng: &mut StdRng,
    now_ms: u64,
) -> Result<Reply, CommandError> {
    expect_arity(argv, 1, "randomkey")?;
    Ok(Reply::optional_bulk(store.random_key(rng, now_ms)))
}

pub(crate) fn rename(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "rename")?;
    store.rename(&argv[1], &argv[2], now_ms)?;
    Ok(Reply::ok())
}

pub(crate) fn renamenx(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "renamenx")?;
    Ok(Reply::boolean(store.renamenx(&argv[1], &argv[2], now_ms)?))
}

pub(crate) fn touch(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 2, "touch")?;
    Ok(Reply::integer(store.touch(&argv[1..], now_ms)))
}

pub(crate) fn expire(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "expire")?;
    let seconds = parse_i64_arg(&argv[2])?;
    Ok(Reply::boolean(store.expire_seconds(&argv[1], seconds, now_ms)))
}

pub(crate) fn pexpire(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "pexpire")?;
    let millis = parse_i64_arg(&argv[2])?;
    Ok(Reply::boolean(store.expire_milliseconds(&argv[1], millis, now_ms)))
}

/// `EXPIREAT` and `PEXPIREAT` share one rule: the timestamp's magnitude
/// decides whether it is read as seconds or milliseconds.
pub(crate) fn expireat(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    name: &'static str,
) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, name)?;
    let unix_time = parse_i64_arg(&argv[2])?;
    Ok(Reply::boolean(store.expire_at(&argv[1], unix_time, now_ms)))
}

pub(crate) fn ttl(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "ttl")?;
    Ok(Reply::Integer(store.pttl(&argv[1], now_ms).as_seconds_reply()))
}

pub(crate) fn pttl(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "pttl")?;
    Ok(Reply::Integer(store.pttl(&argv[1], now_ms).as_millis_reply()))
}

pub(crate) fn persist(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "persist")?;
    Ok(Reply::boolean(store.persist(&argv[1], now_ms)))
}

pub(crate) fn dump(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "dump")?;
    Ok(Reply::optional_bulk(store.dump(&argv[1], now_ms)?))
}

/// `RESTORE key ttl payload [REPLACE]`.
pub(crate) fn restore(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 4, "restore")?;
    let ttl = parse_i64_arg(&argv[2])?;
    if ttl < 0 {
        return Err(CommandError::NegativeTtl);
    }
    let mut replace = false;
    for option in &argv[4..] {
        if eq_ascii_command(option, "replace") {
            replace = true;
        } else {
            return Err(CommandError::SyntaxError);
        }
    }
    store.restore(&argv[1], ttl.unsigned_abs(), &argv[3], replace, now_ms)?;
    Ok(Reply::ok())
}

#[cfg(test)]
mod tests {
    use mr_protocol::Reply;

    use crate::tests::{Harness, bulks};
    use crate::{CommandError, ErrorKind};

    #[test]
    fn ping_echo_time() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&["PING"]), Reply::SimpleString("PONG".to_string()));
        assert_eq!(h.ok(&["ping", "hi"]), Reply::bulk("hi"));
        assert_eq!(h.ok(&["echo", "x"]), Reply::bulk("x"));
        h.now_ms = 1_700_000_000_123;
        assert_eq!(h.ok(&["time"]), bulks(&["1700000000", "123000"]));
        assert_eq!(h.run(&["ping", "a", "b"]), Err(CommandError::WrongArity("ping")));
    }

    #[test]
    fn ttl_lifecycle() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&["ttl", "k"]), Reply::Integer(-2));
        h.ok(&["set", "k", "v"]);
        assert_eq!(h.ok(&["ttl", "k"]), Reply::Integer(-1));
        assert_eq!(h.ok(&["expire", "k", "10"]), Reply::Integer(1));
        h.now_ms += 500;
        assert_eq!(h.ok(&["ttl", "k"]), Reply::Integer(9));
        assert_eq!(h.ok(&["pttl", "k"]), Reply::Integer(9_500));
        assert_eq!(h.ok(&["persist", "k"]), Reply::Integer(1));
        assert_eq!(h.ok(&["persist", "k"]), Reply::Integer(0));
        assert_eq!(h.ok(&["pexpire", "k", "100"]), Reply::Integer(1));
        h.now_ms += 100;
        assert_eq!(h.ok(&["exists", "k"]), Reply::Integer(0));
        assert_eq!(h.ok(&["expire", "k", "10"]), Reply::Integer(0));
    }

    #[test]
    fn non_positive_expire_deletes() {
        let mut h = Harness::new();
        h.ok(&["set", "k", "v"]);
        assert_eq!(h.ok(&["expire", "k", "0"]), Reply::Integer(1));
        assert_eq!(h.ok(&["get", "k"]), Reply::null_bulk());
        assert_eq!(
            h.run(&["expire", "k", "soon"]).map_err(|e| e.kind()),
            Err(ErrorKind::NotAnInteger)
        );
    }

    #[test]
    fn expireat_reads_seconds_or_millis_by_magnitude() {
        let mut h = Harness::new();
        h.now_ms = 1_700_000_000_000;
        h.ok(&["set", "a", "1"]);
        h.ok(&["set", "b", "1"]);
        assert_eq!(h.ok(&["expireat", "a", "1700000010"]), Reply::Integer(1));
        assert_eq!(h.ok(&["pexpireat", "b", "1700000010000"]), Reply::Integer(1));
        assert_eq!(h.ok(&["pttl", "a"]), Reply::Integer(10_000));
        assert_eq!(h.ok(&["pttl", "b"]), Reply::Integer(10_000));
        assert_eq!(h.ok(&["expireat", "a", "1600000000"]), Reply::Integer(1));
        assert_eq!(h.ok(&["exists", "a"]), Reply::Integer(0));
    }

    #[test]
    fn exists_counts_repeats_and_type_reports_none() {
        let mut h = Harness::new();
        h.ok(&["set", "k", "v"]);
        h.ok(&["rpush", "l", "x"]);
        assert_eq!(h.ok(&["exists", "k", "k", "missing", "l"]), Reply::Integer(3));
        assert_eq!(h.ok(&["type", "l"]), Reply::SimpleString("list".to_string()));
        assert_eq!(h.ok(&["type", "zz"]), Reply::SimpleString("none".to_string()));
        assert_eq!(h.ok(&["del", "k", "l", "zz"]), Reply::Integer(2));
        assert_eq!(h.ok(&["dbsize"]), Reply::Integer(0));
    }

    #[test]
    fn keys_and_rename() {
        let mut h = Harness::new();
        h.ok(&["mset", "user:1", "a", "user:2", "b", "other", "c"]);
        assert_eq!(h.ok(&["keys", "user:*"]), bulks(&["user:1", "user:2"]));
        assert_eq!(h.ok(&["keys", "user:[^1]"]), bulks(&["user:2"]));
        assert_eq!(h.ok(&["rename", "other", "user:3"]), Reply::ok());
        assert_eq!(h.ok(&["renamenx", "user:3", "user:1"]), Reply::Integer(0));
        assert_eq!(h.ok(&["rename", "user:3", "user:3"]), Reply::ok());
        assert_eq!(h.run(&["rename", "nope", "x"]), Err(CommandError::NoSuchKey));
    }

    #[test]
    fn databases_select_swap_move() {
        let mut h = Harness::new();
        h.ok(&["set", "k", "zero"]);
        assert_eq!(h.ok(&["move", "k", "1"]), Reply::Integer(1));
        assert_eq!(h.ok(&["exists", "k"]), Reply::Integer(0));
        assert_eq!(h.ok(&["select", "1"]), Reply::ok());
        assert_eq!(h.ok(&["get", "k"]), Reply::bulk("zero"));
        assert_eq!(h.run(&["move", "k", "1"]), Err(CommandError::SameObject));
        assert_eq!(h.ok(&["swapdb", "0", "1"]), Reply::ok());
        assert_eq!(h.ok(&["dbsize"]), Reply::Integer(0));
        assert_eq!(h.run(&["select", "16"]), Err(CommandError::DbIndexOutOfRange));
        assert_eq!(h.run(&["swapdb", "0", "x"]), Err(CommandError::DbIndexOutOfRange));
        assert_eq!(h.ok(&["flushall"]), Reply::ok());
        assert_eq!(h.dbs.current_index(), 0);
        assert_eq!(h.ok(&["dbsize"]), Reply::Integer(0));
    }

    #[test]
    fn flushdb_clears_only_the_selected_database() {
        let mut h = Harness::new();
        h.ok(&["set", "zero", "0"]);
        h.ok(&["select", "2"]);
        h.ok(&["set", "two", "2"]);
        assert_eq!(h.ok(&["flushdb", "ASYNC"]), Reply::ok());
        assert_eq!(h.ok(&["dbsize"]), Reply::Integer(0));
        assert_eq!(h.dbs.current_index(), 2);
        h.ok(&["select", "0"]);
        assert_eq!(h.ok(&["get", "zero"]), Reply::bulk("0"));
        assert_eq!(h.run(&["flushdb", "later"]), Err(CommandError::SyntaxError));
    }

    #[test]
    fn randomkey_and_touch() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&["randomkey"]), Reply::null_bulk());
        h.ok(&["set", "only", "1"]);
        assert_eq!(h.ok(&["randomkey"]), Reply::bulk("only"));
        assert_eq!(h.ok(&["touch", "only", "missing"]), Reply::Integer(1));
    }

    #[test]
    fn dump_restore_cycle() {
        let mut h = Harness::new();
        h.ok(&["zadd", "z", "1", "a", "2.5", "b"]);
        let payload = h.ok(&["dump", "z"]).as_bulk().map(<[u8]>::to_vec).expect("payload");
        let restore = |key: &str, ttl: &str, replace: bool| {
            let mut argv = vec![
                b"restore".to_vec(),
                key.as_bytes().to_vec(),
                ttl.as_bytes().to_vec(),
                payload.clone(),
            ];
            if replace {
                argv.push(b"REPLACE".to_vec());
            }
            argv
        };
        assert_eq!(h.run_raw(&restore("z", "0", false)), Err(CommandError::BusyKey));
        assert_eq!(h.run_raw(&restore("z2", "5000", false)), Ok(Reply::ok()));
        assert_eq!(h.ok(&["zscore", "z2", "b"]), Reply::bulk("2.5"));
        assert_eq!(h.ok(&["pttl", "z2"]), Reply::Integer(5_000));
        assert_eq!(h.run_raw(&restore("z", "0", true)), Ok(Reply::ok()));
        assert_eq!(h.ok(&["dump", "missing"]), Reply::null_bulk());
        assert_eq!(h.run_raw(&restore("x", "-1", false)), Err(CommandError::NegativeTtl));
        let err = h.run(&["restore", "x", "0", "garbage"]).expect_err("bad payload");
        assert_eq!(err.kind(), ErrorKind::WrongPayload);
        assert_eq!(h.ok(&["exists", "x"]), Reply::Integer(0));
    }
}
