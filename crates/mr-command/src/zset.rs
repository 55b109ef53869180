//! Sorted-set commands and the option grammar of the range queries.

use mr_protocol::Reply;
use mr_store::{
    LexRange, RangeLimit, ScoreRange, Store, ZaddCondition, ZaddOptions, ZaddUpdate,
    parse_float, parse_lex_bound, parse_score_bound,
};

use crate::{
    CommandError, eq_ascii_command, expect_arity, expect_min_arity, parse_f64_arg,
    parse_i64_arg, score_reply,
};

/// `ZADD key [NX|XX] [GT|LT] [CH] [INCR] score member [score member ...]`.
pub(crate) fn zadd(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 4, "zadd")?;
    let (mut nx, mut xx, mut gt, mut lt, mut ch, mut incr) = (false, false, false, false, false, false);
    let mut index = 2;
    while let Some(token) = argv.get(index) {
        if eq_ascii_command(token, "nx") {
            nx = true;
        } else if eq_ascii_command(token, "xx") {
            xx = true;
        } else if eq_ascii_command(token, "gt") {
            gt = true;
        } else if eq_ascii_command(token, "lt") {
            lt = true;
        } else if eq_ascii_command(token, "ch") {
            ch = true;
        } else if eq_ascii_command(token, "incr") {
            incr = true;
        } else {
            break;
        }
        index += 1;
    }
    if (nx && xx) || (gt && lt) || (nx && (gt || lt)) {
        return Err(CommandError::SyntaxError);
    }

    let rest = &argv[index..];
    let Some(first) = rest.first() else {
        return Err(CommandError::WrongArity("zadd"));
    };
    if parse_float(first).is_none() {
        return Err(CommandError::SyntaxError);
    }
    if rest.len() % 2 != 0 {
        return Err(CommandError::WrongArity("zadd"));
    }
    if incr && rest.len() != 2 {
        return Err(CommandError::ZaddIncrPair);
    }
    let pairs = rest
        .chunks_exact(2)
        .map(|pair| Ok((parse_f64_arg(&pair[0])?, pair[1].clone())))
        .collect::<Result<Vec<(f64, Vec<u8>)>, CommandError>>()?;

    let options = ZaddOptions {
        condition: if nx {
            ZaddCondition::IfAbsent
        } else if xx {
            ZaddCondition::IfPresent
        } else {
            ZaddCondition::Always
        },
        update: if gt {
            ZaddUpdate::GreaterThan
        } else if lt {
            ZaddUpdate::LessThan
        } else {
            ZaddUpdate::Any
        },
        increment: incr,
    };
    let outcome = store.zadd(&argv[1], &pairs, options, now_ms)?;
    if incr {
        return Ok(outcome.score.map_or_else(Reply::null_bulk, score_reply));
    }
    let changed = if ch { outcome.added + outcome.updated } else { outcome.added };
    Ok(Reply::integer(changed))
}

pub(crate) fn zincrby(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "zincrby")?;
    let delta = parse_f64_arg(&argv[2])?;
    Ok(score_reply(store.zincrby(&argv[1], delta, &argv[3], now_ms)?))
}

pub(crate) fn zrem(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 3, "zrem")?;
    Ok(Reply::integer(store.zrem(&argv[1], &argv[2..], now_ms)?))
}

pub(crate) fn zcard(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 2, "zcard")?;
    Ok(Reply::integer(store.zcard(&argv[1], now_ms)?))
}

pub(crate) fn zscore(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, "zscore")?;
    let score = store.zscore(&argv[1], &argv[2], now_ms)?;
    Ok(score.map_or_else(Reply::null_bulk, score_reply))
}

pub(crate) fn zrank(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    reverse: bool,
) -> Result<Reply, CommandError> {
    expect_arity(argv, 3, if reverse { "zrevrank" } else { "zrank" })?;
    let rank = store.zrank(&argv[1], &argv[2], reverse, now_ms)?;
    Ok(rank.map_or_else(Reply::null_bulk, Reply::integer))
}

fn members_reply(items: Vec<(Vec<u8>, f64)>, with_scores: bool) -> Reply {
    let mut out = Vec::with_capacity(items.len() * if with_scores { 2 } else { 1 });
    for (member, score) in items {
        out.push(Reply::bulk(member));
        if with_scores {
            out.push(score_reply(score));
        }
    }
    Reply::array(out)
}

/// `ZRANGE`/`ZREVRANGE key start stop [WITHSCORES]`.
pub(crate) fn zrange(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    reverse: bool,
) -> Result<Reply, CommandError> {
    let name = if reverse { "zrevrange" } else { "zrange" };
    let with_scores = match argv.len() {
        4 => false,
        5 if eq_ascii_command(&argv[4], "withscores") => true,
        5 => return Err(CommandError::SyntaxError),
        _ => return Err(CommandError::WrongArity(name)),
    };
    let start = parse_i64_arg(&argv[2])?;
    let stop = parse_i64_arg(&argv[3])?;
    let items = store.zrange_by_rank(&argv[1], start, stop, reverse, now_ms)?;
    Ok(members_reply(items, with_scores))
}

struct RangeOptions {
    with_scores: bool,
    limit: Option<RangeLimit>,
}

/// Trailing `WITHSCORES` and `LIMIT offset count` of the by-score and
/// by-lex queries. `WITHSCORES` is only accepted when `allow_scores`.
fn parse_range_options(
    args: &[Vec<u8>],
    allow_scores: bool,
    name: &'static str,
) -> Result<RangeOptions, CommandError> {
    let mut options = RangeOptions {
        with_scores: false,
        limit: None,
    };
    let mut index = 0;
    while let Some(token) = args.get(index) {
        if allow_scores && eq_ascii_command(token, "withscores") {
            options.with_scores = true;
            index += 1;
        } else if eq_ascii_command(token, "limit") {
            let (Some(offset), Some(count)) = (args.get(index + 1), args.get(index + 2)) else {
                return Err(CommandError::WrongArity(name));
            };
            options.limit = Some(RangeLimit {
                offset: parse_i64_arg(offset)?,
                count: parse_i64_arg(count)?,
            });
            index += 3;
        } else {
            return Err(CommandError::SyntaxError);
        }
    }
    Ok(options)
}

/// Score window from `min max`, or `max min` for the reversed commands.
fn score_range(lower: &[u8], upper: &[u8]) -> Result<ScoreRange, CommandError> {
    Ok(ScoreRange::new(parse_score_bound(lower)?, parse_score_bound(upper)?))
}

fn lex_range(lower: &[u8], upper: &[u8]) -> Result<LexRange, CommandError> {
    Ok(LexRange::new(parse_lex_bound(lower)?, parse_lex_bound(upper)?))
}

pub(crate) fn zrangebyscore(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    reverse: bool,
) -> Result<Reply, CommandError> {
    let name = if reverse { "zrevrangebyscore" } else { "zrangebyscore" };
    expect_min_arity(argv, 4, name)?;
    let range = if reverse {
        score_range(&argv[3], &argv[2])?
    } else {
        score_range(&argv[2], &argv[3])?
    };
    let options = parse_range_options(&argv[4..], true, name)?;
    let items = store.zrange_by_score(&argv[1], &range, reverse, options.limit, now_ms)?;
    Ok(members_reply(items, options.with_scores))
}

pub(crate) fn zrangebylex(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
    reverse: bool,
) -> Result<Reply, CommandError> {
    let name = if reverse { "zrevrangebylex" } else { "zrangebylex" };
    expect_min_arity(argv, 4, name)?;
    let range = if reverse {
        lex_range(&argv[3], &argv[2])?
    } else {
        lex_range(&argv[2], &argv[3])?
    };
    let options = parse_range_options(&argv[4..], false, name)?;
    let items = store.zrange_by_lex(&argv[1], &range, reverse, options.limit, now_ms)?;
    Ok(members_reply(items, false))
}

pub(crate) fn zcount(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "zcount")?;
    let range = score_range(&argv[2], &argv[3])?;
    Ok(Reply::integer(store.zcount(&argv[1], &range, now_ms)?))
}

pub(crate) fn zlexcount(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "zlexcount")?;
    let range = lex_range(&argv[2], &argv[3])?;
    Ok(Reply::integer(store.zlexcount(&argv[1], &range, now_ms)?))
}

pub(crate) fn zremrangebyscore(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "zremrangebyscore")?;
    let range = score_range(&argv[2], &argv[3])?;
    Ok(Reply::integer(store.zremrangebyscore(&argv[1], &range, now_ms)?))
}

pub(crate) fn zremrangebylex(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "zremrangebylex")?;
    let range = lex_range(&argv[2], &argv[3])?;
    Ok(Reply::integer(store.zremrangebylex(&argv[1], &range, now_ms)?))
}

pub(crate) fn zremrangebyrank(
    argv: &[Vec<u8>],
    store: &mut Store,
    now_ms: u64,
) -> Result<Reply, CommandError> {
    expect_arity(argv, 4, "zremrangebyrank")?;
    let start = parse_i64_arg(&argv[2])?;
    let stop = parse_i64_arg(&argv[3])?;
    Ok(Reply::integer(store.zremrangebyrank(&argv[1], start, stop, now_ms)?))
}

#[cfg(test)]
mod tests {
    use mr_protocol::Reply;

    use crate::tests::{Harness, bulks};
    use crate::{CommandError, ErrorKind};

    fn seeded() -> Harness {
        let mut h = Harness::new();
        h.ok(&["zadd", "z", "1", "a", "2", "b", "3", "c", "4", "d"]);
        h
    }

    #[test]
    fn zadd_flags() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&["zadd", "z", "1", "a", "2", "b"]), Reply::Integer(2));
        assert_eq!(h.ok(&["zadd", "z", "NX", "5", "a", "3", "c"]), Reply::Integer(1));
        assert_eq!(h.ok(&["zscore", "z", "a"]), Reply::bulk("1"));
        assert_eq!(h.ok(&["zadd", "z", "XX", "CH", "5", "a", "9", "new"]), Reply::Integer(1));
        assert_eq!(h.ok(&["zscore", "z", "new"]), Reply::null_bulk());
        assert_eq!(h.ok(&["zadd", "z", "GT", "CH", "4", "a", "10", "b"]), Reply::Integer(1));
        assert_eq!(h.ok(&["zscore", "z", "a"]), Reply::bulk("5"));
        assert_eq!(h.ok(&["zscore", "z", "b"]), Reply::bulk("10"));
        assert_eq!(h.ok(&["zadd", "z", "INCR", "2.5", "a"]), Reply::bulk("7.5"));
        assert_eq!(h.ok(&["zadd", "z", "NX", "INCR", "1", "a"]), Reply::null_bulk());
    }

    #[test]
    fn zadd_argument_errors() {
        let mut h = Harness::new();
        assert_eq!(h.run(&["zadd", "z", "NX", "XX", "1", "a"]), Err(CommandError::SyntaxError));
        assert_eq!(h.run(&["zadd", "z", "NX", "GT", "1", "a"]), Err(CommandError::SyntaxError));
        assert_eq!(h.run(&["zadd", "z", "bogus", "1", "a"]), Err(CommandError::SyntaxError));
        assert_eq!(h.run(&["zadd", "z", "1", "a", "2"]), Err(CommandError::WrongArity("zadd")));
        assert_eq!(h.run(&["zadd", "z", "NX", "CH"]), Err(CommandError::WrongArity("zadd")));
        assert_eq!(
            h.run(&["zadd", "z", "1", "a", "x", "b"]),
            Err(CommandError::NotAValidFloat)
        );
        assert_eq!(
            h.run(&["zadd", "z", "INCR", "1", "a", "2", "b"]),
            Err(CommandError::ZaddIncrPair)
        );
        assert_eq!(h.ok(&["exists", "z"]), Reply::Integer(0));
        h.ok(&["zadd", "z", "inf", "a"]);
        let err = h.run(&["zincrby", "z", "-inf", "a"]).expect_err("nan");
        assert_eq!(err, CommandError::ScoreIsNan);
        assert_eq!(err.kind(), ErrorKind::NotAValidFloat);
    }

    #[test]
    fn ranks_and_scores() {
        let mut h = seeded();
        assert_eq!(h.ok(&["zcard", "z"]), Reply::Integer(4));
        assert_eq!(h.ok(&["zrank", "z", "c"]), Reply::Integer(2));
        assert_eq!(h.ok(&["zrevrank", "z", "c"]), Reply::Integer(1));
        assert_eq!(h.ok(&["zrank", "z", "nope"]), Reply::null_bulk());
        assert_eq!(h.ok(&["zrank", "nokey", "a"]), Reply::null_bulk());
        assert_eq!(h.ok(&["zincrby", "z", "0.5", "a"]), Reply::bulk("1.5"));
        assert_eq!(h.ok(&["zrem", "z", "a", "zz"]), Reply::Integer(1));
    }

    #[test]
    fn rank_ranges() {
        let mut h = seeded();
        assert_eq!(h.ok(&["zrange", "z", "0", "-1"]), bulks(&["a", "b", "c", "d"]));
        assert_eq!(h.ok(&["zrevrange", "z", "0", "1"]), bulks(&["d", "c"]));
        assert_eq!(
            h.ok(&["zrange", "z", "-2", "-1", "WITHSCORES"]),
            bulks(&["c", "3", "d", "4"])
        );
        assert_eq!(h.ok(&["zrange", "z", "3", "1"]), bulks(&[]));
        assert_eq!(h.run(&["zrange", "z", "0", "1", "bogus"]), Err(CommandError::SyntaxError));
    }

    #[test]
    fn score_ranges_with_limit() {
        let mut h = seeded();
        assert_eq!(h.ok(&["zrangebyscore", "z", "(1", "3"]), bulks(&["b", "c"]));
        assert_eq!(h.ok(&["zrangebyscore", "z", "-inf", "+inf", "LIMIT", "1", "2"]), bulks(&["b", "c"]));
        assert_eq!(
            h.ok(&["zrevrangebyscore", "z", "+inf", "2", "WITHSCORES", "LIMIT", "0", "-1"]),
            bulks(&["d", "4", "c", "3", "b", "2"])
        );
        assert_eq!(h.ok(&["zrangebyscore", "z", "0", "10", "LIMIT", "-1", "2"]), bulks(&[]));
        assert_eq!(
            h.run(&["zrangebyscore", "z", "0", "10", "LIMIT", "1"]),
            Err(CommandError::WrongArity("zrangebyscore"))
        );
        assert_eq!(
            h.run(&["zrangebyscore", "z", "0", "10", "LIMIT", "x", "1"]),
            Err(CommandError::NotAnInteger)
        );
        let err = h.run(&["zrangebyscore", "z", "low", "10"]).expect_err("bad bound");
        assert_eq!(err.to_string(), "ERR min or max is not a float");
        assert_eq!(h.ok(&["zcount", "z", "2", "(4"]), Reply::Integer(2));
    }

    #[test]
    fn lex_ranges() {
        let mut h = Harness::new();
        h.ok(&["zadd", "l", "0", "a", "0", "b", "0", "c", "0", "d"]);
        assert_eq!(h.ok(&["zrangebylex", "l", "[b", "(d"]), bulks(&["b", "c"]));
        assert_eq!(h.ok(&["zrevrangebylex", "l", "+", "-", "LIMIT", "0", "2"]), bulks(&["d", "c"]));
        assert_eq!(h.ok(&["zlexcount", "l", "-", "+"]), Reply::Integer(4));
        assert_eq!(h.run(&["zrangebylex", "l", "b", "d"]), Err(CommandError::InvalidLexRange));
        assert_eq!(
            h.run(&["zrangebylex", "l", "-", "+", "WITHSCORES"]),
            Err(CommandError::SyntaxError)
        );
        assert_eq!(h.ok(&["zremrangebylex", "l", "[a", "[b"]), Reply::Integer(2));
        assert_eq!(h.ok(&["zrange", "l", "0", "-1"]), bulks(&["c", "d"]));
    }

    #[test]
    fn removal_ranges() {
        let mut h = seeded();
        assert_eq!(h.ok(&["zremrangebyscore", "z", "-inf", "(2"]), Reply::Integer(1));
        assert_eq!(h.ok(&["zremrangebyrank", "z", "0", "0"]), Reply::Integer(1));
        assert_eq!(h.ok(&["zrange", "z", "0", "-1"]), bulks(&["c", "d"]));
        assert_eq!(h.ok(&["zremrangebyrank", "z", "0", "-1"]), Reply::Integer(2));
        assert_eq!(h.ok(&["exists", "z"]), Reply::Integer(0));
        h.ok(&["set", "s", "v"]);
        assert_eq!(h.run(&["zremrangebyrank", "s", "0", "-1"]), Err(CommandError::WrongType));
    }

    #[test]
    fn infinite_scores_render() {
        let mut h = Harness::new();
        h.ok(&["zadd", "z", "-inf", "lo", "+inf", "hi", "1e20", "big"]);
        assert_eq!(
            h.ok(&["zrange", "z", "0", "-1", "withscores"]),
            bulks(&["lo", "-inf", "big", "1e20", "hi", "inf"])
        );
    }
}
