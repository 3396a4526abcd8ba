//! Named end-effector chains and the per-character IK driver.

use std::collections::BTreeMap;
use std::path::Path;

use cervid_core::{CervidError, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::chain::Chain;
use crate::constraints::ConstraintTable;
use crate::hierarchy::BoneHierarchy;
use crate::ik::{CcdSolver, IkSettings, SolveOutcome, SolveState};
use crate::pose::{apply_chain, PoseReport};
use crate::skeleton::Skeleton;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndEffector {
    Head,
    LeftForeFoot,
    RightForeFoot,
    LeftRearFoot,
    RightRearFoot,
}

impl EndEffector {
    pub const ALL: [EndEffector; 5] = [
        EndEffector::Head,
        EndEffector::LeftForeFoot,
        EndEffector::RightForeFoot,
        EndEffector::LeftRearFoot,
        EndEffector::RightRearFoot,
    ];

    /// Bone names of a four-legged rig: neck to head, thigh to foot.
    pub fn default_chain(self) -> ChainDefinition {
        let (start, end) = match self {
            EndEffector::Head => ("neck", "head"),
            EndEffector::LeftForeFoot => ("left_fore_thigh", "left_fore_foot"),
            EndEffector::RightForeFoot => ("right_fore_thigh", "right_fore_foot"),
            EndEffector::LeftRearFoot => ("left_rear_thigh", "left_rear_foot"),
            EndEffector::RightRearFoot => ("right_rear_thigh", "right_rear_foot"),
        };
        ChainDefinition::new(start, end)
    }
}

/// Processed names of a chain's base and end-effector bones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainDefinition {
    pub start: String,
    pub end: String,
}

impl ChainDefinition {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RigConfig {
    pub settings: IkSettings,
    pub chains: BTreeMap<EndEffector, ChainDefinition>,
    pub constraints: BTreeMap<EndEffector, ConstraintTable>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            settings: IkSettings::default(),
            chains: EndEffector::ALL
                .iter()
                .map(|&e| (e, e.default_chain()))
                .collect(),
            constraints: BTreeMap::new(),
        }
    }
}

impl RigConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded rig config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        for (effector, table) in &self.constraints {
            table.validate().map_err(|e| match e {
                CervidError::InvalidConstraint(msg) => {
                    CervidError::InvalidConstraint(format!("{effector:?} {msg}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Configured chain, falling back to [`EndEffector::default_chain`].
    pub fn chain_for(&self, effector: EndEffector) -> ChainDefinition {
        self.chains
            .get(&effector)
            .cloned()
            .unwrap_or_else(|| effector.default_chain())
    }

    pub fn constraints_for(&self, effector: EndEffector) -> ConstraintTable {
        self.constraints.get(&effector).cloned().unwrap_or_default()
    }
}

/// Drives one end-effector chain of a character toward `rest tip + offset`.
///
/// The chain is built when an end-effector is selected and reused by every
/// later solve until another selection.
pub struct IkRig {
    config: RigConfig,
    solver: CcdSolver,
    effector: Option<EndEffector>,
    chain: Option<Chain>,
    last_outcome: Option<SolveOutcome>,
    /// Target displacement from the end-effector's rest position.
    pub offset: Vec3,
    /// Gates [`IkRig::apply`]; while unset the skeleton keeps its pose.
    pub show_result: bool,
}

impl IkRig {
    pub fn new(config: RigConfig) -> Self {
        let solver = CcdSolver::new(config.settings);
        Self {
            config,
            solver,
            effector: None,
            chain: None,
            last_outcome: None,
            offset: Vec3::ZERO,
            show_result: false,
        }
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn settings(&self) -> &IkSettings {
        &self.solver.settings
    }

    pub fn set_settings(&mut self, settings: IkSettings) -> Result<()> {
        settings.validate()?;
        self.config.settings = settings;
        self.solver.settings = settings;
        Ok(())
    }

    pub fn set_constraints(&mut self, effector: EndEffector, table: ConstraintTable) -> Result<()> {
        table.validate()?;
        if self.effector == Some(effector) {
            self.solver.constraints = table.clone();
        }
        self.config.constraints.insert(effector, table);
        Ok(())
    }

    /// Selects `effector` and extracts its chain from `hierarchy`.
    ///
    /// On failure the rig has no chain and later solves do nothing.
    pub fn select(&mut self, hierarchy: &BoneHierarchy, effector: EndEffector) -> Result<()> {
        let definition = self.config.chain_for(effector);
        self.effector = Some(effector);
        self.solver.constraints = self.config.constraints_for(effector);
        self.last_outcome = None;

        match Chain::from_hierarchy(hierarchy, &definition.start, &definition.end) {
            Ok(chain) => {
                self.chain = Some(chain);
                Ok(())
            }
            Err(e) => {
                log::warn!("No IK chain for {:?}: {}", effector, e);
                self.chain = None;
                Err(e)
            }
        }
    }

    pub fn end_effector(&self) -> Option<EndEffector> {
        self.effector
    }

    pub fn chain(&self) -> Option<&Chain> {
        self.chain.as_ref()
    }

    pub fn target(&self) -> Option<Vec3> {
        self.chain.as_ref().map(|c| c.rest_tip_end() + self.offset)
    }

    /// Solves the selected chain; `None` when no chain is available.
    pub fn solve(&mut self) -> Option<SolveOutcome> {
        let target = self.target()?;
        let chain = self.chain.as_mut()?;
        let outcome = self.solver.solve(chain, target);
        self.last_outcome = Some(outcome);
        Some(outcome)
    }

    pub fn last_outcome(&self) -> Option<SolveOutcome> {
        self.last_outcome
    }

    pub fn state(&self) -> SolveState {
        self.last_outcome
            .map(|o| o.state)
            .unwrap_or(SolveState::Idle)
    }

    /// Copies the solved rotations into `skeleton` when `show_result` is set.
    pub fn apply(&self, skeleton: &mut Skeleton) -> Option<PoseReport> {
        if !self.show_result {
            return None;
        }
        self.chain.as_ref().map(|chain| apply_chain(chain, skeleton))
    }
}
