//! Suspiciousness formulas.

use super::matrix::Spectrum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default D* exponent
pub const DEFAULT_DSTAR: u32 = 2;

/// Spectrum-based suspiciousness formula
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Metric {
    /// `ef / sqrt(F * (ef + ep))`
    #[default]
    Ochiai,
    /// `(ef/F) / (ef/F + ep/P)`
    Tarantula,
    /// `ef^star / (ep + nf)`, unbounded
    DStar {
        /// Exponent applied to `ef`
        star: u32,
    },
    /// `ef / (ef + nf + ep)`
    Jaccard,
}

impl Metric {
    /// D* with the default exponent
    #[must_use]
    pub const fn dstar() -> Self {
        Self::DStar { star: DEFAULT_DSTAR }
    }

    /// Every metric with default parameters
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Ochiai, Self::Tarantula, Self::dstar(), Self::Jaccard]
    }

    /// Whether scores can be infinite
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        matches!(self, Self::DStar { .. })
    }

    /// Score one line from its spectrum counters
    #[must_use]
    pub fn score(&self, s: &Spectrum) -> f64 {
        match self {
            Self::Ochiai => ochiai(s),
            Self::Tarantula => tarantula(s),
            Self::DStar { star } => dstar(s, *star),
            Self::Jaccard => jaccard(s),
        }
    }
}

fn ochiai(s: &Spectrum) -> f64 {
    let total_failing = s.total_failing();
    if total_failing == 0 {
        return 0.0;
    }
    let denominator = ((total_failing * (s.ef + s.ep)) as f64).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    s.ef as f64 / denominator
}

fn tarantula(s: &Spectrum) -> f64 {
    let total_failing = s.total_failing();
    let total_passing = s.total_passing();
    if total_failing == 0 {
        return 0.0;
    }
    if total_passing == 0 {
        return if s.ef > 0 { 1.0 } else { 0.0 };
    }
    let failed_ratio = s.ef as f64 / total_failing as f64;
    let passed_ratio = s.ep as f64 / total_passing as f64;
    let sum = failed_ratio + passed_ratio;
    if sum == 0.0 {
        return 0.0;
    }
    failed_ratio / sum
}

fn dstar(s: &Spectrum, star: u32) -> f64 {
    let denominator = s.ep + s.nf;
    if denominator == 0 {
        return if s.ef > 0 { f64::INFINITY } else { 0.0 };
    }
    let exponent = i32::try_from(star).unwrap_or(i32::MAX);
    (s.ef as f64).powi(exponent) / denominator as f64
}

fn jaccard(s: &Spectrum) -> f64 {
    let denominator = s.ef + s.nf + s.ep;
    if denominator == 0 {
        return 0.0;
    }
    s.ef as f64 / denominator as f64
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ochiai => write!(f, "ochiai"),
            Self::Tarantula => write!(f, "tarantula"),
            Self::DStar { star } if *star == DEFAULT_DSTAR => write!(f, "dstar"),
            Self::DStar { star } => write!(f, "dstar{star}"),
            Self::Jaccard => write!(f, "jaccard"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "ochiai" => Ok(Self::Ochiai),
            "tarantula" => Ok(Self::Tarantula),
            "jaccard" => Ok(Self::Jaccard),
            "dstar" | "d*" => Ok(Self::dstar()),
            other => other
                .strip_prefix("dstar")
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|&star| star > 0 && i32::try_from(star).is_ok())
                .map(|star| Self::DStar { star })
                .ok_or_else(|| {
                    format!("unknown metric '{s}' (expected ochiai, tarantula, dstar or jaccard)")
                }),
        }
    }
}

impl TryFrom<String> for Metric {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> Self {
        metric.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-4;

    /// ef=2, ep=1 with 2 failing and 2 passing test cases
    const REFERENCE: Spectrum = Spectrum {
        ef: 2,
        ep: 1,
        nf: 0,
        np: 1,
    };

    mod formulas {
        use super::*;

        #[test]
        fn test_ochiai_reference() {
            assert!((Metric::Ochiai.score(&REFERENCE) - 0.8165).abs() < EPS);
        }

        #[test]
        fn test_tarantula_reference() {
            assert!((Metric::Tarantula.score(&REFERENCE) - 0.6667).abs() < EPS);
        }

        #[test]
        fn test_dstar_reference() {
            assert_eq!(Metric::dstar().score(&REFERENCE), 4.0);
        }

        #[test]
        fn test_jaccard_reference() {
            assert!((Metric::Jaccard.score(&REFERENCE) - 0.6667).abs() < EPS);
        }

        #[test]
        fn test_dstar_custom_exponent() {
            let s = Spectrum {
                ef: 2,
                ep: 1,
                nf: 1,
                np: 0,
            };
            assert_eq!(Metric::DStar { star: 3 }.score(&s), 4.0);
        }
    }

    mod edge_cases {
        use super::*;

        #[test]
        fn test_no_failing_tests_scores_zero() {
            let s = Spectrum {
                ef: 0,
                ep: 3,
                nf: 0,
                np: 1,
            };
            assert_eq!(Metric::Ochiai.score(&s), 0.0);
            assert_eq!(Metric::Tarantula.score(&s), 0.0);
            assert_eq!(Metric::Jaccard.score(&s), 0.0);
        }

        #[test]
        fn test_tarantula_without_passing_tests() {
            let covered = Spectrum {
                ef: 1,
                ep: 0,
                nf: 1,
                np: 0,
            };
            let uncovered = Spectrum {
                ef: 0,
                ep: 0,
                nf: 2,
                np: 0,
            };
            assert_eq!(Metric::Tarantula.score(&covered), 1.0);
            assert_eq!(Metric::Tarantula.score(&uncovered), 0.0);
        }

        #[test]
        fn test_tarantula_line_in_no_test() {
            let s = Spectrum {
                ef: 0,
                ep: 0,
                nf: 1,
                np: 1,
            };
            assert_eq!(Metric::Tarantula.score(&s), 0.0);
        }

        #[test]
        fn test_dstar_infinite_only_when_executed_by_failing() {
            let hit = Spectrum {
                ef: 2,
                ep: 0,
                nf: 0,
                np: 5,
            };
            let miss = Spectrum {
                ef: 0,
                ep: 0,
                nf: 0,
                np: 5,
            };
            assert_eq!(Metric::dstar().score(&hit), f64::INFINITY);
            assert_eq!(Metric::dstar().score(&miss), 0.0);
        }

        #[test]
        fn test_ochiai_uncovered_line() {
            let s = Spectrum {
                ef: 0,
                ep: 0,
                nf: 2,
                np: 2,
            };
            assert_eq!(Metric::Ochiai.score(&s), 0.0);
        }
    }

    mod parsing {
        use super::*;

        #[test]
        fn test_parse_names() {
            assert_eq!("ochiai".parse::<Metric>().unwrap(), Metric::Ochiai);
            assert_eq!("Tarantula".parse::<Metric>().unwrap(), Metric::Tarantula);
            assert_eq!("dstar".parse::<Metric>().unwrap(), Metric::dstar());
            assert_eq!(
                "dstar3".parse::<Metric>().unwrap(),
                Metric::DStar { star: 3 }
            );
            assert_eq!("jaccard".parse::<Metric>().unwrap(), Metric::Jaccard);
        }

        #[test]
        fn test_parse_rejects_unknown() {
            assert!("ample".parse::<Metric>().is_err());
            assert!("dstar0".parse::<Metric>().is_err());
        }

        #[test]
        fn test_parse_rejects_exponent_beyond_i32() {
            assert!("dstar4294967295".parse::<Metric>().is_err());
            assert!("dstar2147483648".parse::<Metric>().is_err());
            assert_eq!(
                "dstar2147483647".parse::<Metric>().unwrap(),
                Metric::DStar { star: 2_147_483_647 }
            );
        }

        #[test]
        fn test_huge_exponent_never_inverts() {
            let s = Spectrum { ef: 2, ep: 1, nf: 1, np: 0 };
            assert!(Metric::DStar { star: u32::MAX }.score(&s) >= 1.0);
        }

        #[test]
        fn test_display_round_trips() {
            for metric in [Metric::Ochiai, Metric::DStar { star: 4 }, Metric::dstar()] {
                assert_eq!(metric.to_string().parse::<Metric>().unwrap(), metric);
            }
        }

        #[test]
        fn test_serde_uses_names() {
            let json = serde_json::to_string(&Metric::Jaccard).unwrap();
            assert_eq!(json, "\"jaccard\"");
            let metric: Metric = serde_json::from_str("\"dstar\"").unwrap();
            assert_eq!(metric, Metric::dstar());
        }
    }
}
