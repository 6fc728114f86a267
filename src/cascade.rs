//! Single-pass cascade calculation over an ordered chain of components.
//!
//! The walk is deterministic, left to right, once per invocation. The two
//! fatal conditions, a missing specification and a compression overshoot,
//! abort immediately with the offending component identified; a fresh
//! calculation request re-runs the whole pass.

use std::collections::HashMap;

use tracing::debug;

use crate::component::{Component, ComponentId};
use crate::constants::REFERENCE_TEMPERATURE_K;
use crate::convert::{linear_to_db, milliwatts_to_dbm};
use crate::error::{BudgetError, BudgetResult};
use crate::spec::{Direction, GainPartition};

/// One row of the per-stage table, reported with the accumulators' state
/// through that stage.
#[derive(Clone, Debug)]
pub struct StageRow {
    pub label: String,
    pub cumulative_gain_db: f64,
    pub cumulative_noise_figure_db: f64,
    pub cumulative_power_dbm: f64,
}

/// Input/output power seen by one stage during a run. Keyed by component
/// handle in the result so a run never writes through shared state.
#[derive(Clone, Copy, Debug)]
pub struct StagePower {
    pub input_dbm: f64,
    pub output_dbm: f64,
}

/// Receive-side figures of merit, present on reverse-direction results.
#[derive(Clone, Copy, Debug)]
pub struct ReceiveFigures {
    /// Summed gain of the leading run of antenna stages.
    pub antenna_gain_db: f64,
    pub antenna_temperature_k: f64,
    pub receiver_temperature_k: f64,
    pub system_temperature_k: f64,
    pub g_over_t_db_per_k: f64,
}

/// Chain-level totals.
#[derive(Clone, Debug)]
pub struct ChainTotals {
    pub gain_db: f64,
    pub noise_figure_db: f64,
    /// Cascaded output-referred P1dB, forward direction. `None` when no
    /// stage can compress (unbounded).
    pub output_p1db_dbm: Option<f64>,
    /// Final output power; in the forward direction this is the EIRP when
    /// the chain ends in an antenna.
    pub output_power_dbm: f64,
    /// Diagnostic three-way gain split by stage category.
    pub partition: GainPartition,
    pub receive: Option<ReceiveFigures>,
}

/// Per-stage table plus chain totals for one cascade pass.
#[derive(Clone, Debug)]
pub struct CascadeResult {
    pub rows: Vec<StageRow>,
    pub stage_powers: HashMap<ComponentId, StagePower>,
    pub totals: ChainTotals,
}

/// Walk an ordered chain at one frequency and direction, seeding the
/// power accumulator with `input_power_dbm`.
///
/// The chain is assumed to already be a linear, acyclic, single-path
/// sequence; ordering is the caller's contract.
pub fn calculate(
    chain: &[&Component],
    frequency: &str,
    direction: Direction,
    input_power_dbm: f64,
) -> BudgetResult<CascadeResult> {
    if chain.is_empty() {
        return Err(BudgetError::EmptyChain);
    }
    debug!(%frequency, %direction, input_power_dbm, stages = chain.len(), "cascade pass");

    let mut rows: Vec<StageRow> = Vec::with_capacity(chain.len());
    let mut stage_powers = HashMap::with_capacity(chain.len());
    let mut specs = Vec::with_capacity(chain.len());

    let mut running_pout_dbm = input_power_dbm;
    let mut chain_gain_linear = 1.0_f64;

    // Friis accumulators; the noise gain tracks cascaded stages only
    let mut noise_factor_total = 0.0_f64;
    let mut noise_gain_linear = 1.0_f64;
    let mut noise_cascade_started = false;

    let mut partition = GainPartition::default();

    for (index, component) in chain.iter().enumerate() {
        let spec = component
            .spec(frequency, direction)
            .ok_or_else(|| BudgetError::MissingSpec {
                component: component.name.clone(),
                frequency: frequency.to_string(),
                direction,
            })?;
        specs.push((*component, spec));

        let stage_pin_dbm = running_pout_dbm;
        running_pout_dbm = stage_pin_dbm + spec.gain_db;
        stage_powers.insert(
            component.id(),
            StagePower {
                input_dbm: stage_pin_dbm,
                output_dbm: running_pout_dbm,
            },
        );

        let category = component.category();
        if category.is_passive() {
            partition.passive_db += spec.gain_db;
        } else if category.is_antenna() {
            partition.antenna_db += spec.gain_db;
        } else {
            partition.active_db += spec.gain_db;
        }

        // Forward: noise cascade starts at stage 0. Reverse: antenna
        // stages stay out of the cascade entirely (their contribution
        // lands in the G/T temperature step); it starts at the first
        // non-antenna stage.
        let mut first_noise_stage = false;
        let mut noise_stage = false;
        match direction {
            Direction::Forward => {
                first_noise_stage = index == 0;
                noise_cascade_started = true;
                noise_stage = true;
            }
            Direction::Reverse => {
                if !category.is_antenna() {
                    if !noise_cascade_started {
                        noise_cascade_started = true;
                        first_noise_stage = true;
                    }
                    noise_stage = true;
                }
            }
        }
        if noise_stage {
            if first_noise_stage {
                noise_factor_total = spec.noise_factor;
                noise_gain_linear = spec.gain_linear;
            } else {
                noise_factor_total += (spec.noise_factor - 1.0) / noise_gain_linear;
                noise_gain_linear *= spec.gain_linear;
            }
        }

        chain_gain_linear *= spec.gain_linear;

        rows.push(StageRow {
            label: format!("({}) {}", index + 1, component.name),
            cumulative_gain_db: linear_to_db(chain_gain_linear),
            cumulative_noise_figure_db: if noise_cascade_started {
                linear_to_db(noise_factor_total)
            } else {
                0.0
            },
            cumulative_power_dbm: running_pout_dbm,
        });
        debug!(
            stage = index + 1,
            name = %component.name,
            gain_db = spec.gain_db,
            pout_dbm = running_pout_dbm,
            "stage"
        );

        // Compression checkpoint, transmit flow only; antennas radiate
        // rather than compress. The failing stage keeps its table row.
        if direction == Direction::Forward && !category.is_antenna() {
            if let Some(p1db_dbm) = spec.output_p1db_dbm {
                if running_pout_dbm > p1db_dbm {
                    return Err(BudgetError::Compression {
                        component: component.name.clone(),
                        component_id: component.id(),
                        output_dbm: running_pout_dbm,
                        p1db_dbm,
                        rows,
                    });
                }
            }
        }
    }

    // Cascaded output P1dB: each compressible stage contributes the
    // reciprocal of its P1dB (mW) referred to the chain output through
    // the gain of every strictly later stage.
    let mut output_p1db_dbm = None;
    if direction == Direction::Forward {
        let mut gain_to_end_linear = 1.0_f64;
        let mut inverse_sum_per_mw = 0.0_f64;
        for (component, spec) in specs.iter().rev() {
            if !component.category().is_antenna() {
                if let Some(p1db_mw) = spec.output_p1db_mw {
                    inverse_sum_per_mw += 1.0 / (p1db_mw * gain_to_end_linear);
                }
            }
            gain_to_end_linear *= spec.gain_linear;
        }
        if inverse_sum_per_mw > 0.0 {
            output_p1db_dbm = Some(milliwatts_to_dbm(1.0 / inverse_sum_per_mw));
        }
    }

    let noise_figure_db = if noise_cascade_started {
        linear_to_db(noise_factor_total)
    } else {
        0.0
    };

    // G/T: antenna gain over the leading antenna run, receiver noise
    // referred to the reference temperature.
    let receive = match direction {
        Direction::Forward => None,
        Direction::Reverse => {
            let mut antenna_gain_db = 0.0;
            for (component, spec) in &specs {
                if component.category().is_antenna() {
                    antenna_gain_db += spec.gain_db;
                } else {
                    break;
                }
            }
            let antenna_temperature_k = REFERENCE_TEMPERATURE_K;
            let receiver_temperature_k =
                rfconversions::noise::noise_temperature_from_noise_figure(noise_figure_db);
            let system_temperature_k = antenna_temperature_k + receiver_temperature_k;
            let g_over_t_db_per_k = antenna_gain_db - linear_to_db(system_temperature_k);
            debug!(
                antenna_gain_db,
                system_temperature_k, g_over_t_db_per_k, "receive figures"
            );
            Some(ReceiveFigures {
                antenna_gain_db,
                antenna_temperature_k,
                receiver_temperature_k,
                system_temperature_k,
                g_over_t_db_per_k,
            })
        }
    };

    Ok(CascadeResult {
        rows,
        stage_powers,
        totals: ChainTotals {
            gain_db: linear_to_db(chain_gain_linear),
            noise_figure_db,
            output_p1db_dbm,
            output_power_dbm: running_pout_dbm,
            partition,
            receive,
        },
    })
}
