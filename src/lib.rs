//! Link budget analysis for cascaded RF chains: total gain, Friis noise
//! figure, compression checkpoints, cascaded output P1dB, EIRP, and
//! receive-side G/T, in both signal directions.

pub mod array;
pub mod cascade;
#[cfg(feature = "cli")]
pub mod cli;
pub mod component;
pub mod constants;
pub mod convert;
pub mod error;
pub mod file;
pub mod lineup;
pub mod merge;
pub mod propagation;
pub mod spec;

pub use array::array_gain_db;
pub use cascade::{calculate, CascadeResult, ChainTotals, ReceiveFigures, StagePower, StageRow};
pub use component::{
    Category, Component, ComponentDef, ComponentId, PropagationConfig, PropagationMode,
};
pub use error::{BudgetError, BudgetResult};
pub use lineup::Lineup;
pub use merge::{merge, unmerge};
pub use propagation::free_space_path_loss_db;
pub use spec::{ComponentSpec, Direction, GainPartition, RawSpec};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_stage_chain_through_the_public_api() {
        let amplifier = Component::active("Low Noise Amplifier", "1.0", 30.0, 3.0, None)
            .expect("valid preset");
        let attenuator = Component::passive("Attenuator", "1.0", 6.0).expect("valid preset");

        let result = calculate(
            &[&amplifier, &attenuator],
            "1.0",
            Direction::Forward,
            -30.0,
        )
        .expect("chain cascades");

        assert_eq!(result.totals.output_power_dbm, -6.0);
        assert!((result.totals.gain_db - 24.0).abs() < 1e-9);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1].label, "(2) Attenuator");
    }

    #[test]
    fn lineup_walks_the_drawn_order() {
        let mut lineup = Lineup::new();
        let amplifier = lineup.add(
            Component::active("PA", "1.0", 20.0, 5.0, Some(33.0)).expect("valid preset"),
        );
        let aperture = lineup.add(Component::antenna("Dish", "1.0", 12.0).expect("valid preset"));
        lineup
            .connect(Direction::Forward, amplifier, aperture)
            .expect("both exist");

        let result = lineup
            .calculate("1.0", Direction::Forward, -10.0)
            .expect("chain cascades");
        // EIRP: -10 + 20 + 12
        assert_eq!(result.totals.output_power_dbm, 22.0);
    }
}
