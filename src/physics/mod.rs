//! Per-timestep physics: battery model, charge and discharge planning,
//! generation-side flows and invariant validators.

pub mod balance;
pub mod battery;
pub mod charge;
pub mod discharge;
pub mod solar;
pub mod types;

pub use battery::{BatteryConfig, BatteryState, charge_limit, update_soc};
pub use charge::{grid_charge_power, pv_to_bess};
pub use discharge::{
    DischargeCondition, DischargeConditions, discharge_power, evaluate_discharge_permission,
};
pub use solar::{direct_pv_consumption, scale_generation, surplus_generation};
pub use types::{ChargingMode, GridChargeMode, StrategyMode, TimePeriod};
