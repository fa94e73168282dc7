// src/calc/mod.rs  -  Request layer: raw parameters → core → {open, close, err_msg}
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acp::{self, TimeCalculator};

/// Wire format for start / open / close instants.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Used when a request omits `km`.
pub const DEFAULT_CONTROL_KM: f64 = 999.0;
/// Used when a request omits `brevet_dist_km`.
pub const DEFAULT_BREVET_KM: f64 = 1000.0;

pub const INVALID_CONTROL_MSG: &str =
    "Invalid Control! It should not greater than the total distance. Or you entered a negative number!";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("begin_date {input:?} is not in YYYY-MM-DDTHH:mm form")]
    BadStartTime {
        input:  String,
        #[source]
        source: chrono::ParseError,
    },
    /// A fixed offset maps every local time to exactly one instant, so this
    /// only fires when the shifted time leaves chrono's representable range.
    #[error("begin_date {0:?} has no single instant in offset {1}")]
    AmbiguousStartTime(String, FixedOffset),
}

/// Query parameters of `/_calc_times`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalcQuery {
    pub km:             Option<f64>,
    pub brevet_dist_km: Option<f64>,
    pub begin_date:     Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcResult {
    pub open:    Option<String>,
    pub close:   Option<String>,
    pub err_msg: String,
}

/// Top-level JSON body: `{"result": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcResponse {
    pub result: CalcResult,
}

/// Boundary policy knobs layered above the core.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    /// Time zone the start string is read in.
    pub utc_offset:              FixedOffset,
    /// Report "control beyond finish" in err_msg (times are still clamped).
    pub reject_beyond_brevet:    bool,
    /// Only accept 200/300/400/600/1000 km brevets.
    pub strict_brevet_distances: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            utc_offset:              Utc.fix(),
            reject_beyond_brevet:    true,
            strict_brevet_distances: false,
        }
    }
}

pub fn parse_start(s: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>, RequestError> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), TIME_FORMAT)
        .map_err(|source| RequestError::BadStartTime { input: s.to_string(), source })?;
    localize(&naive, offset).ok_or_else(|| RequestError::AmbiguousStartTime(s.to_string(), offset))
}

fn localize(naive: &NaiveDateTime, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    offset.from_local_datetime(naive).single()
}

pub fn format_instant<Tz: TimeZone>(t: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    t.format(TIME_FORMAT).to_string()
}

/// Handle one `/_calc_times` request.  Only a malformed start time is an
/// `Err`; every distance problem is reported through `err_msg`.
pub fn calc_times(
    calc:   &TimeCalculator,
    policy: &Policy,
    query:  &CalcQuery,
) -> Result<CalcResponse, RequestError> {
    let km = query.km.unwrap_or(DEFAULT_CONTROL_KM);
    let brevet_km = query.brevet_dist_km.unwrap_or(DEFAULT_BREVET_KM);
    log::debug!("km={km} brevet_dist_km={brevet_km} begin_date={:?}", query.begin_date);

    let start = match query.begin_date.as_deref() {
        Some(s) => parse_start(s, policy.utc_offset)?,
        None    => Utc::now().with_timezone(&policy.utc_offset),
    };

    if policy.strict_brevet_distances && !acp::is_canonical_brevet(brevet_km) {
        log::debug!("rejecting non-ACP brevet distance {brevet_km}");
        return Ok(CalcResponse {
            result: CalcResult {
                open:    None,
                close:   None,
                err_msg: format!(
                    "Brevet distance {brevet_km} km is not an ACP distance (200, 300, 400, 600 or 1000)"
                ),
            },
        });
    }

    let mut err_msg = String::new();
    if km < 0.0 || (policy.reject_beyond_brevet && km > brevet_km) {
        err_msg = INVALID_CONTROL_MSG.to_string();
    }

    let result = match calc.control_times(km, brevet_km, &start) {
        Ok(t) => CalcResult {
            open:  Some(format_instant(&t.open)),
            close: Some(format_instant(&t.close)),
            err_msg,
        },
        Err(e) => {
            log::debug!("core rejected control: {e}");
            CalcResult {
                open:    None,
                close:   None,
                err_msg: if err_msg.is_empty() { e.to_string() } else { err_msg },
            }
        }
    };
    Ok(CalcResponse { result })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(km: f64, brevet: f64) -> CalcQuery {
        CalcQuery {
            km:             Some(km),
            brevet_dist_km: Some(brevet),
            begin_date:     Some("2023-01-01T00:00".into()),
        }
    }

    fn run(query: &CalcQuery, policy: &Policy) -> CalcResult {
        calc_times(&TimeCalculator::default(), policy, query).unwrap().result
    }

    #[test]
    fn computes_open_and_close() {
        let r = run(&q(200.0, 200.0), &Policy::default());
        assert_eq!(r.open.as_deref(), Some("2023-01-01T05:53"));
        assert_eq!(r.close.as_deref(), Some("2023-01-01T13:20"));
        assert!(r.err_msg.is_empty());
    }

    #[test]
    fn negative_control_has_no_times() {
        let r = run(&q(-5.0, 200.0), &Policy::default());
        assert_eq!(r.open, None);
        assert_eq!(r.close, None);
        assert_eq!(r.err_msg, INVALID_CONTROL_MSG);
    }

    #[test]
    fn control_beyond_finish_is_flagged_but_clamped() {
        let r = run(&q(250.0, 200.0), &Policy::default());
        assert_eq!(r.err_msg, INVALID_CONTROL_MSG);
        assert_eq!(r.open.as_deref(), Some("2023-01-01T05:53"));
    }

    #[test]
    fn lenient_policy_clamps_silently() {
        let policy = Policy { reject_beyond_brevet: false, ..Policy::default() };
        let r = run(&q(250.0, 200.0), &policy);
        assert!(r.err_msg.is_empty());
        assert_eq!(r.close.as_deref(), Some("2023-01-01T13:20"));
    }

    #[test]
    fn strict_policy_rejects_odd_brevets() {
        let policy = Policy { strict_brevet_distances: true, ..Policy::default() };
        let r = run(&q(100.0, 250.0), &policy);
        assert_eq!(r.open, None);
        assert!(r.err_msg.contains("250"));
        assert!(run(&q(100.0, 300.0), &policy).err_msg.is_empty());
    }

    #[test]
    fn non_finite_brevet_reports_core_error() {
        let policy = Policy { reject_beyond_brevet: false, ..Policy::default() };
        let r = run(&q(100.0, f64::NAN), &policy);
        assert_eq!(r.open, None);
        assert!(r.err_msg.starts_with("invalid distance"));
    }

    #[test]
    fn missing_distances_use_defaults() {
        let query = CalcQuery { begin_date: Some("2023-01-01T00:00".into()), ..Default::default() };
        let r = run(&query, &Policy::default());
        // 999 km of a 1000 km brevet
        let c = TimeCalculator::default();
        let open = c.open_minutes(DEFAULT_CONTROL_KM, DEFAULT_BREVET_KM).unwrap();
        let expected = parse_start("2023-01-01T00:00", FixedOffset::east_opt(0).unwrap()).unwrap()
            + chrono::TimeDelta::minutes(open);
        assert_eq!(r.open, Some(format_instant(&expected)));
        assert!(r.err_msg.is_empty());
    }

    #[test]
    fn missing_start_defaults_to_now() {
        let query = CalcQuery { km: Some(0.0), brevet_dist_km: Some(200.0), begin_date: None };
        let r = run(&query, &Policy::default());
        assert!(r.open.is_some());
        assert!(r.close.is_some());
    }

    #[test]
    fn start_is_read_in_configured_offset() {
        let policy = Policy { utc_offset: FixedOffset::east_opt(2 * 3600).unwrap(), ..Policy::default() };
        let start = parse_start("2023-06-01T06:00", policy.utc_offset).unwrap();
        assert_eq!(start.to_rfc3339(), "2023-06-01T06:00:00+02:00");
        let r = run(&q(0.0, 200.0), &policy);
        assert_eq!(r.close.as_deref(), Some("2023-01-01T01:00"));
    }

    #[test]
    fn start_at_the_edge_of_the_calendar_has_no_instant() {
        let west = FixedOffset::west_opt(8 * 3600).unwrap();
        assert!(localize(&NaiveDateTime::MAX, west).is_none());
        assert!(localize(&NaiveDateTime::MAX, Utc.fix()).is_some());
        let err = RequestError::AmbiguousStartTime("x".into(), west);
        assert!(err.to_string().contains("-08:00"));
    }

    #[test]
    fn huge_distances_report_out_of_range() {
        let r = run(&q(1e12, 1e12), &Policy::default());
        assert_eq!(r.open, None);
        assert_eq!(r.close, None);
        assert!(r.err_msg.contains("out of range"), "{}", r.err_msg);
    }

    #[test]
    fn malformed_start_is_an_error() {
        let query = CalcQuery { begin_date: Some("01/01/2023 08:00".into()), ..q(10.0, 200.0) };
        let err = calc_times(&TimeCalculator::default(), &Policy::default(), &query).unwrap_err();
        assert!(matches!(err, RequestError::BadStartTime { .. }));
    }

    #[test]
    fn response_json_shape() {
        let resp = calc_times(&TimeCalculator::default(), &Policy::default(), &q(0.0, 200.0)).unwrap();
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "result": { "open": "2023-01-01T00:00", "close": "2023-01-01T01:00", "err_msg": "" }
            })
        );
    }
}
