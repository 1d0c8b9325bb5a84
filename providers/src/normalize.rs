//! Raw-string to canonical-enum conversion at the sync boundary.
//!
//! Every function here is pure. Matching is case-insensitive and
//! accent-folded. A lookup miss fails loudly with a [`NormalizeError`]
//! naming the source, the field, and the offending raw value; the sync
//! orchestrator catches those and records the record as skipped.

use crate::taxa::{EventType, GameStatus, Position};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{source_name} sent unrecognized {field} value {raw_value:?}")]
pub struct NormalizeError {
    pub source_name: String,
    pub field: &'static str,
    pub raw_value: String,
}

impl NormalizeError {
    fn new(source_name: &str, field: &'static str, raw_value: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            field,
            raw_value: raw_value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("clock value {raw:?} is not MM:SS")]
pub struct ClockParseError {
    pub raw: String,
}

/// Lowercase, fold Latin diacritics to ASCII, collapse runs of whitespace.
/// The result is the `name_key` used for matching and search everywhere
/// downstream.
pub fn fold_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars().flat_map(char::to_lowercase) {
        let folded = fold_char(c);
        if folded.is_empty() {
            continue;
        }
        for f in folded.chars() {
            if f.is_whitespace() {
                pending_space = true;
            } else {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(f);
            }
        }
    }
    out
}

// NFKD-style decomposition for the Latin ranges that actually occur in
// roster data. Anything unrecognized passes through unchanged.
fn fold_char(c: char) -> &'static str {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'č' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => "i",
        'ĵ' => "j",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => {
            // Pass through one char at a time without allocating.
            const ASCII: &str = "abcdefghijklmnopqrstuvwxyz0123456789";
            if let Some(idx) = ASCII.find(c) {
                &ASCII[idx..idx + c.len_utf8()]
            } else {
                match c {
                    ' ' | '\t' | '\n' | '\r' => " ",
                    '.' => "",
                    '\'' | '’' | '`' => "",
                    '-' | '–' | ',' | '/' => {
                        match c {
                            '-' | '–' => "-",
                            ',' => ",",
                            '/' => "/",
                            _ => unreachable!(),
                        }
                    }
                    _ => " ",
                }
            }
        }
    }
}

/// Accepts both `"First Last"` and `"LAST, FIRST"` shapes and returns
/// `(first_name, last_name)`. Multi-word remainders stay on the last name
/// in the first shape and on the first name in the second.
pub fn split_person_name(raw: &str) -> (String, String) {
    let raw = raw.trim();
    if let Some((last, first)) = raw.split_once(',') {
        (first.trim().to_string(), last.trim().to_string())
    } else {
        match raw.split_once(char::is_whitespace) {
            Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
            None => (String::new(), raw.to_string()),
        }
    }
}

/// `"MM:SS"` to whole seconds. MM may exceed 60 (total minutes played in
/// multi-overtime games, or a provider counting a full game).
pub fn parse_clock(raw: &str) -> Result<i32, ClockParseError> {
    let raw_trimmed = raw.trim();
    let Some((minutes, seconds)) = raw_trimmed.split_once(':') else {
        return Err(ClockParseError { raw: raw.to_string() });
    };
    let minutes: i32 = minutes
        .trim()
        .parse()
        .map_err(|_| ClockParseError { raw: raw.to_string() })?;
    let seconds: i32 = seconds
        .trim()
        .parse()
        .map_err(|_| ClockParseError { raw: raw.to_string() })?;
    if minutes < 0 || !(0..60).contains(&seconds) {
        return Err(ClockParseError { raw: raw.to_string() });
    }
    Ok(minutes * 60 + seconds)
}

/// Boxscore minutes column, stored as integer seconds.
pub fn parse_minutes(raw: &str, source_name: &str) -> Result<i32, NormalizeError> {
    parse_clock(raw).map_err(|_| NormalizeError::new(source_name, "minutes", raw))
}

/// One raw position cell to one or more canonical positions. Handles
/// slash- and comma-separated combos ("PG/SG", "F, C").
///
/// Known variants (after folding):
///
/// | canonical       | raw variants |
/// |-----------------|--------------|
/// | POINT_GUARD     | pg, 1, point, point guard, playmaker, base, meneur, lead guard |
/// | SHOOTING_GUARD  | sg, 2, two guard, shooting guard, escolta, guardia, arriere, off guard |
/// | SMALL_FORWARD   | sf, 3, small forward, alero, ailier, ala piccola, swingman, wing |
/// | POWER_FORWARD   | pf, 4, power forward, ala-pivot, ailier fort, ala grande, stretch four |
/// | CENTER          | c, 5, center, centre, pivot, centro, big man, post |
/// | GUARD           | g, guard, combo guard, backcourt |
/// | FORWARD         | f, forward, ala, forwards, frontcourt, cornerman |
pub fn normalize_position(raw: &str, source_name: &str) -> Result<Vec<Position>, NormalizeError> {
    let folded = fold_name(raw);
    let mut positions = Vec::new();
    for token in folded.split(['/', ',']) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let position = match token {
            "pg" | "1" | "point" | "point guard" | "playmaker" | "base" | "meneur"
            | "lead guard" => Position::PointGuard,
            "sg" | "2" | "two guard" | "shooting guard" | "escolta" | "guardia" | "arriere"
            | "off guard" => Position::ShootingGuard,
            "sf" | "3" | "small forward" | "alero" | "ailier" | "ala piccola" | "swingman"
            | "wing" => Position::SmallForward,
            "pf" | "4" | "power forward" | "ala-pivot" | "ailier fort" | "ala grande"
            | "stretch four" => Position::PowerForward,
            "c" | "5" | "center" | "centre" | "pivot" | "centro" | "big man" | "post" => {
                Position::Center
            }
            "g" | "guard" | "combo guard" | "backcourt" => Position::Guard,
            "f" | "forward" | "forwards" | "ala" | "frontcourt" | "cornerman" => Position::Forward,
            "gf" | "g-f" | "guard-forward" => {
                positions.push(Position::Guard);
                Position::Forward
            }
            "fc" | "f-c" | "forward-center" => {
                positions.push(Position::Forward);
                Position::Center
            }
            _ => return Err(NormalizeError::new(source_name, "position", raw)),
        };
        if !positions.contains(&position) {
            positions.push(position);
        }
    }
    if positions.is_empty() {
        return Err(NormalizeError::new(source_name, "position", raw));
    }
    Ok(positions)
}

/// Raw status cell to canonical status. Sources with bare numeric or
/// single-letter codes get a source table first; everything else falls
/// through to the shared variant table.
///
/// Shared variants (after folding):
///
/// | canonical | raw variants |
/// |-----------|--------------|
/// | SCHEDULED | scheduled, sched, upcoming, pre, pregame, pre-game, not started, notstarted, future, tbd, time tba |
/// | LIVE      | live, in progress, inprogress, in play, playing, halftime, half, q1..q4, ot, overtime |
/// | FINAL     | final, finished, complete, completed, ended, end, full time, ft, after ot, final ot, final/ot, closed, official |
/// | POSTPONED | postponed, ppd, suspended, delayed, rescheduled, moved |
/// | CANCELLED | cancelled, canceled, cancel, abandoned, annulled, called off |
pub fn normalize_game_status(raw: &str, source_name: &str) -> Result<GameStatus, NormalizeError> {
    let folded = fold_name(raw);
    let by_code = match source_name {
        "winner" => match folded.as_str() {
            "0" => Some(GameStatus::Scheduled),
            "1" => Some(GameStatus::Live),
            "2" => Some(GameStatus::Final),
            "3" => Some(GameStatus::Postponed),
            "4" => Some(GameStatus::Cancelled),
            _ => None,
        },
        "euroleague" => match folded.as_str() {
            "s" => Some(GameStatus::Scheduled),
            "l" => Some(GameStatus::Live),
            "f" | "r" => Some(GameStatus::Final),
            "p" => Some(GameStatus::Postponed),
            "c" => Some(GameStatus::Cancelled),
            _ => None,
        },
        "nbastats" => match folded.as_str() {
            "1" => Some(GameStatus::Scheduled),
            "2" => Some(GameStatus::Live),
            "3" => Some(GameStatus::Final),
            _ => None,
        },
        _ => None,
    };
    if let Some(status) = by_code {
        return Ok(status);
    }

    let status = match folded.as_str() {
        "scheduled" | "sched" | "upcoming" | "pre" | "pregame" | "pre-game" | "not started"
        | "notstarted" | "future" | "tbd" | "time tba" => GameStatus::Scheduled,
        "live" | "in progress" | "inprogress" | "in play" | "playing" | "halftime" | "half"
        | "q1" | "q2" | "q3" | "q4" | "ot" | "overtime" => GameStatus::Live,
        "final" | "finished" | "complete" | "completed" | "ended" | "end" | "full time" | "ft"
        | "after ot" | "final ot" | "final/ot" | "closed" | "official" => GameStatus::Final,
        "postponed" | "ppd" | "suspended" | "delayed" | "rescheduled" | "moved" => {
            GameStatus::Postponed
        }
        "cancelled" | "canceled" | "cancel" | "abandoned" | "annulled" | "called off" => {
            GameStatus::Cancelled
        }
        _ => return Err(NormalizeError::new(source_name, "game_status", raw)),
    };
    Ok(status)
}

/// Raw play-by-play action string to canonical event type plus an optional
/// normalized subtype.
///
/// Known variants (after folding):
///
/// | canonical    | raw variants (subtype in parens) |
/// |--------------|----------------------------------|
/// | SHOT         | shot, fg, fga, field goal, 2pt, 3pt, jump shot (jump_shot), jumper (jump_shot), layup (layup), lay-up (layup), dunk (dunk), slam dunk (dunk), hook shot (hook), tip in (tip_in), fadeaway (fadeaway), floater (floater) |
/// | FREE_THROW   | ft, free throw, freethrow, foul shot |
/// | REBOUND      | reb, rebound, board, defensive rebound (defensive), def rebound (defensive), offensive rebound (offensive), off rebound (offensive) |
/// | ASSIST       | ast, assist |
/// | TURNOVER     | to, tov, turnover, lost ball (lost_ball), bad pass (bad_pass), travel (travelling), travelling (travelling), out of bounds (out_of_bounds), offensive foul turnover (offensive_foul) |
/// | STEAL        | stl, steal |
/// | BLOCK        | blk, block, blocked shot |
/// | FOUL         | foul, personal foul (personal), pf (personal), offensive foul (offensive), technical foul (technical), unsportsmanlike foul (unsportsmanlike), flagrant foul (flagrant) |
/// | SUBSTITUTION | sub, substitution, sub in, sub out |
/// | TIMEOUT      | timeout, time out, tv timeout (tv), official timeout (tv) |
/// | JUMP_BALL    | jump ball, jumpball, tip off, tip-off, opening tip |
/// | PERIOD_START | period start, start period, begin period, start of quarter, quarter start |
/// | PERIOD_END   | period end, end period, end of quarter, quarter end, end of period |
/// | VIOLATION    | violation, goaltending (goaltending), shot clock violation (shot_clock), 3 seconds (three_seconds), kicked ball (kicked_ball), lane violation (lane) |
pub fn normalize_event_type(
    raw: &str,
    source_name: &str,
) -> Result<(EventType, Option<String>), NormalizeError> {
    let folded = fold_name(raw);
    let (ty, subtype): (EventType, Option<&str>) = match folded.as_str() {
        "shot" | "fg" | "fga" | "field goal" | "2pt" | "3pt" | "2pt shot" | "3pt shot"
        | "two point shot" | "three point shot" => (EventType::Shot, None),
        "jump shot" | "jumper" => (EventType::Shot, Some("jump_shot")),
        "layup" | "lay-up" | "lay up" | "driving layup" => (EventType::Shot, Some("layup")),
        "dunk" | "slam dunk" => (EventType::Shot, Some("dunk")),
        "hook shot" | "hook" => (EventType::Shot, Some("hook")),
        "tip in" | "tip-in" | "putback" => (EventType::Shot, Some("tip_in")),
        "fadeaway" | "fade away" => (EventType::Shot, Some("fadeaway")),
        "floater" => (EventType::Shot, Some("floater")),

        "ft" | "free throw" | "freethrow" | "foul shot" => (EventType::FreeThrow, None),

        "reb" | "rebound" | "board" => (EventType::Rebound, None),
        "defensive rebound" | "def rebound" | "def reb" => (EventType::Rebound, Some("defensive")),
        "offensive rebound" | "off rebound" | "off reb" => (EventType::Rebound, Some("offensive")),

        "ast" | "assist" => (EventType::Assist, None),

        "to" | "tov" | "turnover" => (EventType::Turnover, None),
        "lost ball" => (EventType::Turnover, Some("lost_ball")),
        "bad pass" => (EventType::Turnover, Some("bad_pass")),
        "travel" | "travelling" | "traveling" => (EventType::Turnover, Some("travelling")),
        "out of bounds" => (EventType::Turnover, Some("out_of_bounds")),
        "offensive foul turnover" => (EventType::Turnover, Some("offensive_foul")),

        "stl" | "steal" => (EventType::Steal, None),

        "blk" | "block" | "blocked shot" => (EventType::Block, None),

        "foul" => (EventType::Foul, None),
        "pf" | "personal foul" => (EventType::Foul, Some("personal")),
        "offensive foul" => (EventType::Foul, Some("offensive")),
        "technical foul" => (EventType::Foul, Some("technical")),
        "unsportsmanlike foul" => (EventType::Foul, Some("unsportsmanlike")),
        "flagrant foul" => (EventType::Foul, Some("flagrant")),

        "sub" | "substitution" | "sub in" | "sub out" => (EventType::Substitution, None),

        "timeout" | "time out" => (EventType::Timeout, None),
        "tv timeout" | "official timeout" => (EventType::Timeout, Some("tv")),

        "jump ball" | "jumpball" | "tip off" | "tip-off" | "opening tip" => {
            (EventType::JumpBall, None)
        }

        "period start" | "start period" | "begin period" | "start of quarter"
        | "quarter start" => (EventType::PeriodStart, None),
        "period end" | "end period" | "end of quarter" | "quarter end" | "end of period" => {
            (EventType::PeriodEnd, None)
        }

        "violation" => (EventType::Violation, None),
        "goaltending" => (EventType::Violation, Some("goaltending")),
        "shot clock violation" => (EventType::Violation, Some("shot_clock")),
        "3 seconds" | "three seconds" => (EventType::Violation, Some("three_seconds")),
        "kicked ball" => (EventType::Violation, Some("kicked_ball")),
        "lane violation" => (EventType::Violation, Some("lane")),

        _ => return Err(NormalizeError::new(source_name, "event_type", raw)),
    };
    Ok((ty, subtype.map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_name_lowercases_and_strips_accents() {
        assert_eq!(fold_name("Šarūnas  Jasikevičius"), "sarunas jasikevicius");
        assert_eq!(fold_name("  Luka   DONČIĆ "), "luka doncic");
        assert_eq!(fold_name("O'Neal Jr."), "oneal jr");
    }

    #[test]
    fn split_person_name_handles_both_shapes() {
        assert_eq!(
            split_person_name("Scottie Wilbekin"),
            ("Scottie".to_string(), "Wilbekin".to_string())
        );
        assert_eq!(
            split_person_name("WILBEKIN, Scottie"),
            ("Scottie".to_string(), "WILBEKIN".to_string())
        );
        assert_eq!(
            split_person_name("Walter Tavares Jr"),
            ("Walter".to_string(), "Tavares Jr".to_string())
        );
    }

    #[test]
    fn parse_clock_accepts_minutes_over_sixty() {
        assert_eq!(parse_clock("09:41").unwrap(), 581);
        assert_eq!(parse_clock("65:02").unwrap(), 3902);
        assert_eq!(parse_clock("0:00").unwrap(), 0);
        assert!(parse_clock("12:75").is_err());
        assert!(parse_clock("12").is_err());
    }

    #[test]
    fn positions_match_accented_and_combo_variants() {
        assert_eq!(
            normalize_position("Pívot", "euroleague").unwrap(),
            vec![Position::Center]
        );
        assert_eq!(
            normalize_position("PG/SG", "winner").unwrap(),
            vec![Position::PointGuard, Position::ShootingGuard]
        );
        assert_eq!(
            normalize_position("Ailier Fort", "euroleague").unwrap(),
            vec![Position::PowerForward]
        );
        assert_eq!(
            normalize_position("G-F", "nbastats").unwrap(),
            vec![Position::Guard, Position::Forward]
        );
    }

    #[test]
    fn unknown_position_fails_loudly_with_context() {
        let err = normalize_position("zone marshal", "winner").unwrap_err();
        assert_eq!(err.source_name, "winner");
        assert_eq!(err.field, "position");
        assert_eq!(err.raw_value, "zone marshal");
    }

    #[test]
    fn statuses_resolve_source_codes_before_the_shared_table() {
        assert_eq!(
            normalize_game_status("2", "winner").unwrap(),
            GameStatus::Final
        );
        assert_eq!(
            normalize_game_status("2", "nbastats").unwrap(),
            GameStatus::Live
        );
        assert_eq!(
            normalize_game_status("Full Time", "euroleague").unwrap(),
            GameStatus::Final
        );
        assert_eq!(
            normalize_game_status("PPD", "winner").unwrap(),
            GameStatus::Postponed
        );
        assert!(normalize_game_status("mystery", "winner").is_err());
    }

    #[test]
    fn event_types_carry_normalized_subtypes() {
        assert_eq!(
            normalize_event_type("Driving Layup", "nbastats").unwrap(),
            (EventType::Shot, Some("layup".to_string()))
        );
        assert_eq!(
            normalize_event_type("Offensive Rebound", "winner").unwrap(),
            (EventType::Rebound, Some("offensive".to_string()))
        );
        assert_eq!(
            normalize_event_type("SUB", "euroleague").unwrap(),
            (EventType::Substitution, None)
        );
        let err = normalize_event_type("quantum leap", "winner").unwrap_err();
        assert_eq!(err.field, "event_type");
    }
}
