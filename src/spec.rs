use std::fmt;

use serde::{Deserialize, Serialize};

use crate::convert::{db_to_linear, dbm_to_milliwatts};

/// Signal flow through the chain: transmit (forward) or receive (reverse).
/// Each component may carry distinct specs per direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Forward, Direction::Reverse];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// Diagnostic split of a gain total into its active, passive, and antenna
/// contributions. The three parts sum to the total gain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GainPartition {
    pub active_db: f64,
    pub passive_db: f64,
    pub antenna_db: f64,
}

impl GainPartition {
    pub fn total_db(&self) -> f64 {
        self.active_db + self.passive_db + self.antenna_db
    }
}

/// The untransformed, dB-domain inputs for one frequency/direction of a
/// component, as entered or loaded. This is the shape that serializes;
/// linear-domain values are always recomputed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawSpec {
    /// A lossy passive two-port. Gain and noise figure both derive from
    /// the loss (Friis: F = L), and the stage cannot compress.
    Loss { loss_db: f64 },
    /// An explicit gain/noise/compression entry for active and antenna
    /// parts. `output_p1db_dbm: None` means the stage cannot compress.
    Gain {
        gain_db: f64,
        noise_figure_db: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_p1db_dbm: Option<f64>,
    },
    /// The cascaded totals of a collapsed sub-chain, kept with the
    /// three-way gain partition of the original members.
    Derived {
        gain_db: f64,
        noise_figure_db: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_p1db_dbm: Option<f64>,
        active_gain_db: f64,
        passive_gain_db: f64,
        antenna_gain_db: f64,
    },
}

impl RawSpec {
    /// Spec kind label used in category-mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            RawSpec::Loss { .. } => "loss",
            RawSpec::Gain { .. } => "gain",
            RawSpec::Derived { .. } => "derived",
        }
    }

    /// Resolve the raw inputs into per-direction values with their
    /// linear-domain caches. Pure; the receiver is never mutated.
    ///
    /// A reverse-direction entry never keeps a compression point: the
    /// compression checkpoint only exists in the transmit flow.
    pub fn resolve(&self, direction: Direction) -> ComponentSpec {
        match *self {
            RawSpec::Loss { loss_db } => ComponentSpec::new(-loss_db, loss_db, None, None),
            RawSpec::Gain {
                gain_db,
                noise_figure_db,
                output_p1db_dbm,
            } => ComponentSpec::new(
                gain_db,
                noise_figure_db,
                directed_p1db(output_p1db_dbm, direction),
                None,
            ),
            RawSpec::Derived {
                gain_db,
                noise_figure_db,
                output_p1db_dbm,
                active_gain_db,
                passive_gain_db,
                antenna_gain_db,
            } => ComponentSpec::new(
                gain_db,
                noise_figure_db,
                directed_p1db(output_p1db_dbm, direction),
                Some(GainPartition {
                    active_db: active_gain_db,
                    passive_db: passive_gain_db,
                    antenna_db: antenna_gain_db,
                }),
            ),
        }
    }
}

fn directed_p1db(output_p1db_dbm: Option<f64>, direction: Direction) -> Option<f64> {
    match direction {
        Direction::Forward => output_p1db_dbm,
        Direction::Reverse => None,
    }
}

/// A component's resolved values for one frequency and direction, with
/// the linear-domain equivalents the cascade engine consumes.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentSpec {
    pub gain_db: f64,
    pub noise_figure_db: f64,
    /// Output-referred 1 dB compression point. `None` = uncompressible.
    pub output_p1db_dbm: Option<f64>,
    pub gain_linear: f64,
    pub noise_factor: f64,
    pub output_p1db_mw: Option<f64>,
    /// Only present on derived (merged) specs.
    pub partition: Option<GainPartition>,
}

impl ComponentSpec {
    fn new(
        gain_db: f64,
        noise_figure_db: f64,
        output_p1db_dbm: Option<f64>,
        partition: Option<GainPartition>,
    ) -> Self {
        Self {
            gain_db,
            noise_figure_db,
            output_p1db_dbm,
            gain_linear: db_to_linear(gain_db),
            noise_factor: rfconversions::noise::noise_factor_from_noise_figure(noise_figure_db),
            output_p1db_mw: output_p1db_dbm.map(dbm_to_milliwatts),
            partition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_resolves_to_negative_gain_and_matching_nf() {
        let raw = RawSpec::Loss { loss_db: 6.0 };
        let spec = raw.resolve(Direction::Forward);
        assert_eq!(spec.gain_db, -6.0);
        assert_eq!(spec.noise_figure_db, 6.0);
        assert_eq!(spec.output_p1db_dbm, None);
        assert!((spec.gain_linear - 0.251188643).abs() < 1e-9);
    }

    #[test]
    fn gain_keeps_compression_point_forward_only() {
        let raw = RawSpec::Gain {
            gain_db: 15.0,
            noise_figure_db: 1.5,
            output_p1db_dbm: Some(20.0),
        };
        let forward = raw.resolve(Direction::Forward);
        assert_eq!(forward.output_p1db_dbm, Some(20.0));
        assert!((forward.output_p1db_mw.unwrap() - 100.0).abs() < 1e-9);

        let reverse = raw.resolve(Direction::Reverse);
        assert_eq!(reverse.output_p1db_dbm, None);
        assert_eq!(reverse.output_p1db_mw, None);
        // gain and noise are direction independent for the same raw entry
        assert_eq!(reverse.gain_db, forward.gain_db);
        assert_eq!(reverse.noise_figure_db, forward.noise_figure_db);
    }

    #[test]
    fn noise_factor_cache_matches_figure() {
        let raw = RawSpec::Gain {
            gain_db: 0.0,
            noise_figure_db: 3.0103,
            output_p1db_dbm: None,
        };
        let spec = raw.resolve(Direction::Forward);
        assert!((spec.noise_factor - 2.0).abs() < 1e-4);
    }

    #[test]
    fn derived_carries_partition_summing_to_gain() {
        let raw = RawSpec::Derived {
            gain_db: 20.0,
            noise_figure_db: 2.5,
            output_p1db_dbm: Some(18.0),
            active_gain_db: 27.0,
            passive_gain_db: -19.0,
            antenna_gain_db: 12.0,
        };
        let spec = raw.resolve(Direction::Forward);
        let partition = spec.partition.expect("derived spec keeps its partition");
        assert!((partition.total_db() - spec.gain_db).abs() < 1e-12);
    }

    #[test]
    fn raw_spec_round_trips_through_toml() {
        let raw = RawSpec::Gain {
            gain_db: -7.0,
            noise_figure_db: 7.0,
            output_p1db_dbm: Some(15.0),
        };
        let text = toml::to_string(&raw).expect("serializes");
        let back: RawSpec = toml::from_str(&text).expect("parses");
        assert_eq!(back, raw);
    }

    #[test]
    fn uncompressible_entry_omits_the_field() {
        let raw = RawSpec::Gain {
            gain_db: 12.0,
            noise_figure_db: 0.0,
            output_p1db_dbm: None,
        };
        let text = toml::to_string(&raw).expect("serializes");
        assert!(!text.contains("output_p1db_dbm"));
        let back: RawSpec = toml::from_str(&text).expect("parses");
        assert_eq!(back, raw);
    }
}
