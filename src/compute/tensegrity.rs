//! A growing tensegrity and its construction stage.
//!
//! [`Tensegrity`] ties a [`Fabric`] to its [`Growth`] and owns the stage
//! machine. Growth decides only when `Growing` ends; every later stage is
//! requested by the caller and forwarded to the engine. The current stage is
//! published on a watch channel that observers subscribe to.

use cgmath::{Matrix4, Point3, Vector3};
use log::{debug, info};
use tokio::sync::watch;

use super::engine::{Engine, Stage};
use super::fabric::{Fabric, Interval, IntervalRole, JointKey};
use super::growth::{Growth, GrowthError};
use super::vulcanize::{triangulate, vulcanize};
use crate::schema::{Experiment, FabricConfig, GrowthConfig, Tenscript};

/// An interval the runner may contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Muscle {
    /// Engine position of the interval.
    pub interval: usize,
    /// Length the muscle relaxes back to.
    pub rest: f32,
}

/// A settled tensegrity, ready to be cloned into evolution runners.
#[derive(Debug, Clone)]
pub struct Leader<S> {
    pub snapshot: S,
    pub muscles: Vec<Muscle>,
    pub midpoint: Point3<f32>,
}

pub struct Tensegrity<E: Engine> {
    fabric: Fabric<E>,
    growth: Growth,
    stage: Stage,
    stage_tx: watch::Sender<Stage>,
    checkpoint: Option<E::Snapshot>,
    triangulated: bool,
    vulcanized: bool,
}

impl<E: Engine> Tensegrity<E> {
    /// Start growing a tenscript on an empty engine.
    pub fn new(
        engine: E,
        tenscript: Tenscript,
        fabric_config: FabricConfig,
        growth_config: GrowthConfig,
    ) -> Result<Self, GrowthError> {
        let mut fabric = Fabric::new(engine, fabric_config);
        let growth = Growth::new(tenscript, growth_config, &mut fabric)?;
        let (stage_tx, _) = watch::channel(Stage::Growing);
        Ok(Self {
            fabric,
            growth,
            stage: Stage::Growing,
            stage_tx,
            checkpoint: None,
            triangulated: false,
            vulcanized: false,
        })
    }

    /// Start growing an experiment's tenscript.
    pub fn from_experiment(engine: E, experiment: &Experiment) -> Result<Self, GrowthError> {
        Self::new(
            engine,
            experiment.tenscript.clone(),
            experiment.fabric.clone(),
            experiment.growth.clone(),
        )
    }

    /// Run one engine tick and, while growing, one growth step.
    ///
    /// Returns `Busy` while the engine is still settling, otherwise the
    /// current stage.
    pub fn iterate(&mut self) -> Result<Stage, GrowthError> {
        let reported = self.fabric.engine_mut().iterate();
        if reported == Stage::Busy {
            return Ok(Stage::Busy);
        }
        if self.stage == Stage::Growing {
            self.growth.step(&mut self.fabric)?;
            if self.growth.is_complete() {
                self.fabric.engine_mut().set_stage(Stage::Shaping);
                self.stage = Stage::Shaping;
                info!(
                    "growth complete after {} ticks: {} bricks",
                    self.growth.ticks(),
                    self.growth.bricks()
                );
            }
        } else if reported > self.stage {
            self.stage = reported;
        }
        self.publish();
        Ok(self.stage)
    }

    /// Move to the next stage on the caller's behalf.
    pub fn request_stage(&mut self, stage: Stage) -> Result<(), GrowthError> {
        let from = self.stage;
        if from == Stage::Growing || stage == Stage::Shaping || from.next() != Some(stage) {
            return Err(GrowthError::StageTransition { from, to: stage });
        }
        match stage {
            Stage::Slack => {
                let removed = self.growth.remove_distancers(&mut self.fabric)?;
                debug!("removed {} distancers", removed);
                self.fabric.engine_mut().set_stage(Stage::Slack);
                self.checkpoint = Some(self.fabric.engine().snapshot());
            }
            Stage::Pretensing => {
                self.lift();
                self.fabric.engine_mut().set_stage(Stage::Pretensing);
            }
            _ => self.fabric.engine_mut().set_stage(stage),
        }
        self.stage = stage;
        info!("stage {:?} -> {:?}", from, stage);
        self.publish();
        Ok(())
    }

    /// Raise the structure so its lowest joint rests on the floor.
    fn lift(&mut self) {
        let lowest = self
            .fabric
            .engine()
            .joint_locations()
            .iter()
            .map(|location| location.y)
            .fold(f32::INFINITY, f32::min);
        if lowest.is_finite() {
            let lift = Matrix4::from_translation(Vector3::new(0.0, -lowest, 0.0));
            self.fabric.apply_matrix(&lift);
        }
    }

    fn publish(&self) {
        let stage = self.stage;
        self.stage_tx.send_if_modified(|current| {
            if *current == stage {
                false
            } else {
                *current = stage;
                true
            }
        });
    }

    /// Add triangle pulls between adjacent pushes. Runs at most once.
    pub fn triangulate(
        &mut self,
        filter: impl Fn(&Interval, &Interval) -> bool,
    ) -> Result<usize, GrowthError> {
        if self.triangulated {
            return Ok(0);
        }
        let added = triangulate(&mut self.fabric, filter)?;
        self.triangulated = true;
        Ok(added)
    }

    /// Add bow pulls between neighbouring push tips. Runs at most once.
    pub fn vulcanize(
        &mut self,
        filter: impl Fn(JointKey, JointKey) -> bool,
    ) -> Result<usize, GrowthError> {
        if self.vulcanized {
            return Ok(0);
        }
        let added = vulcanize(&mut self.fabric, filter)?;
        self.vulcanized = true;
        Ok(added)
    }

    /// Capture the settled structure for evolution.
    pub fn leader(&self) -> Result<Leader<E::Snapshot>, GrowthError> {
        if self.stage != Stage::Pretenst {
            return Err(GrowthError::NotSettled(self.stage));
        }
        let mut muscles = Vec::new();
        for (key, interval) in self.fabric.intervals() {
            if matches!(interval.role, IntervalRole::Ring | IntervalRole::Cross) {
                muscles.push(Muscle {
                    interval: self.fabric.interval_index(key)?,
                    rest: self.fabric.interval_length(key)?,
                });
            }
        }
        Ok(Leader {
            snapshot: self.fabric.engine().snapshot(),
            muscles,
            midpoint: self.fabric.midpoint(),
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn subscribe_stage(&self) -> watch::Receiver<Stage> {
        self.stage_tx.subscribe()
    }

    /// Engine state captured on entering `Slack`.
    pub fn checkpoint(&self) -> Option<&E::Snapshot> {
        self.checkpoint.as_ref()
    }

    pub fn fabric(&self) -> &Fabric<E> {
        &self.fabric
    }

    pub fn growth(&self) -> &Growth {
        &self.growth
    }

    pub fn into_engine(self) -> E {
        self.fabric.into_engine()
    }
}
