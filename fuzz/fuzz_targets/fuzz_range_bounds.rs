#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mr_store::{
    LexRange, ScoreRange, clamp_rank_window, glob_matches, parse_lex_bound, parse_score_bound,
};

#[derive(Debug, Arbitrary)]
struct Input {
    min: Vec<u8>,
    max: Vec<u8>,
    subject: Vec<u8>,
    score: f64,
    start: i64,
    stop: i64,
    len: u16,
}

fuzz_target!(|input: Input| {
    if let (Ok(min), Ok(max)) = (parse_score_bound(&input.min), parse_score_bound(&input.max)) {
        let range = ScoreRange::new(min, max);
        if range.contains(input.score) {
            assert!(range.above_min(input.score) && range.below_max(input.score));
        }
    }
    if let (Ok(min), Ok(max)) = (parse_lex_bound(&input.min), parse_lex_bound(&input.max)) {
        let range = LexRange::new(min, max);
        if range.contains(&input.subject) {
            assert!(range.above_min(&input.subject) && range.below_max(&input.subject));
        }
    }
    let len = usize::from(input.len);
    if let Some((from, to)) = clamp_rank_window(input.start, input.stop, len) {
        assert!(from <= to && to < len);
    }
    let _ = glob_matches(&input.min, &input.subject);
});
