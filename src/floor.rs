//! Floor aggregate and interactive positioning sessions.
//!
//! A [`Floor`] owns the association matrix for one floor document. Positioning a room
//! happens through a [`PositioningSession`], which holds the room's working record and
//! refuses manual adjustments while an automatic search is in flight.

use std::path::{Path, PathBuf};

use nalgebra::Matrix4;
use rand::Rng;

use crate::alignment::{align_scene_objects, align_scene_objects_async, AlignmentResult};
use crate::config::RegistrationConfig;
use crate::error::{Error, Result};
use crate::landmark::Landmark;
use crate::persistence::{
    load_association_matrix, remove_rooms, save_association_matrix, save_room, AssociationMatrix,
};
use crate::transform::TransformRecord;
use crate::ASSOCIATION_FILE_NAME;

/// Step multiplier for continuous (press-and-hold) movement.
pub const HELD_STEP_MULTIPLIER: f64 = 5.0;

/// A displayable room node owned by the rendering layer.
///
/// `base_transform` is the node's world transform before any placement. Applying a record
/// always starts from it, so re-applying after every adjustment does not compound.
pub trait SceneNode {
    fn base_transform(&self) -> Matrix4<f64>;
    fn set_world_transform(&mut self, world: Matrix4<f64>);
}

/// Positions `node` according to `record`.
pub fn apply_record<N: SceneNode + ?Sized>(record: &TransformRecord, node: &mut N) {
    let world = record.apply_to(&node.base_transform());
    node.set_world_transform(world);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Manual,
    AutoPositioning,
}

/// Working state while one room is being positioned.
#[derive(Debug, Clone)]
pub struct PositioningSession {
    room: String,
    record: TransformRecord,
    config: RegistrationConfig,
    state: SessionState,
    /// Record to restore if the running search finds nothing.
    before_search: TransformRecord,
}

impl PositioningSession {
    pub fn new(
        room: impl Into<String>,
        record: TransformRecord,
        config: RegistrationConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            room: room.into(),
            record,
            config,
            state: SessionState::Manual,
            before_search: record,
        })
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn record(&self) -> &TransformRecord {
        &self.record
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// True while automatic positioning is running.
    pub fn is_busy(&self) -> bool {
        self.state == SessionState::AutoPositioning
    }

    fn ensure_manual(&self) -> Result<()> {
        if self.is_busy() {
            return Err(Error::SessionBusy(self.room.clone()));
        }
        Ok(())
    }

    /// Single-step movement in the floor plane.
    pub fn nudge(&mut self, dx: f64, dz: f64) -> Result<()> {
        self.ensure_manual()?;
        self.record.translate(dx, dz);
        Ok(())
    }

    /// Continuous movement while a control is held down.
    pub fn nudge_held(&mut self, dx: f64, dz: f64) -> Result<()> {
        self.nudge(dx * HELD_STEP_MULTIPLIER, dz * HELD_STEP_MULTIPLIER)
    }

    pub fn rotate(&mut self, angle: f64) -> Result<()> {
        self.ensure_manual()?;
        self.record.rotate(angle);
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.ensure_manual()?;
        self.record.reset();
        Ok(())
    }

    /// Marks the session busy and moves the room back to the origin.
    ///
    /// The search runs on un-placed room coordinates, so starting from the identity makes
    /// the result independent of earlier manual adjustments.
    pub fn begin_auto_positioning(&mut self) -> Result<()> {
        self.ensure_manual()?;
        self.before_search = self.record;
        self.record.reset();
        self.state = SessionState::AutoPositioning;
        Ok(())
    }

    /// Applies the outcome of the search started by
    /// [`begin_auto_positioning`](Self::begin_auto_positioning).
    ///
    /// With no result the pre-search record is restored and
    /// [`Error::AutoPositionUnavailable`] is returned so the caller can offer manual
    /// positioning instead.
    pub fn finish_auto_positioning(&mut self, result: Option<AlignmentResult>) -> Result<()> {
        if !self.is_busy() {
            tracing::debug!(room = %self.room, "discarding alignment result for idle session");
            return Ok(());
        }
        self.state = SessionState::Manual;

        match result {
            Some(alignment) => {
                self.record.apply_auto_alignment(&alignment);
                tracing::info!(
                    room = %self.room,
                    angle = alignment.rotation_angle,
                    error = alignment.error,
                    "room auto-positioned"
                );
                Ok(())
            }
            None => {
                self.record = self.before_search;
                tracing::warn!(room = %self.room, "automatic positioning not possible");
                Err(Error::AutoPositionUnavailable(self.room.clone()))
            }
        }
    }

    /// Abandons a running search, restoring the pre-search record.
    pub fn cancel_auto_positioning(&mut self) {
        if self.is_busy() {
            self.record = self.before_search;
            self.state = SessionState::Manual;
        }
    }

    /// Runs automatic positioning inline.
    pub fn auto_position<R: Rng + ?Sized>(
        &mut self,
        room_objects: &[Landmark],
        floor_objects: &[Landmark],
        rng: &mut R,
    ) -> Result<()> {
        self.begin_auto_positioning()?;
        let result = match align_scene_objects(room_objects, floor_objects, &self.config, rng) {
            Ok(result) => result,
            Err(e) => {
                self.cancel_auto_positioning();
                return Err(e);
            }
        };
        self.finish_auto_positioning(result)
    }

    /// Runs automatic positioning on the blocking pool.
    ///
    /// If this future is dropped before completion the session stays busy; call
    /// [`cancel_auto_positioning`](Self::cancel_auto_positioning) to re-enable manual
    /// controls.
    pub async fn auto_position_async(
        &mut self,
        room_objects: Vec<Landmark>,
        floor_objects: Vec<Landmark>,
        seed: Option<u64>,
    ) -> Result<()> {
        self.begin_auto_positioning()?;
        let result =
            match align_scene_objects_async(room_objects, floor_objects, self.config.clone(), seed)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    self.cancel_auto_positioning();
                    return Err(e);
                }
            };
        self.finish_auto_positioning(result)
    }

    /// Re-displays the room at its current working position.
    pub fn apply_to<N: SceneNode + ?Sized>(&self, node: &mut N) {
        apply_record(&self.record, node);
    }
}

/// One floor's room placements, backed by its association document.
#[derive(Debug)]
pub struct Floor {
    dir: PathBuf,
    associations: AssociationMatrix,
}

impl Floor {
    /// Loads the floor's document from `dir`, or starts empty if none exists yet.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let path = dir.join(ASSOCIATION_FILE_NAME);
        let associations = match load_association_matrix(&path) {
            Ok(matrix) => matrix,
            Err(e) if e.is_not_found() => AssociationMatrix::new(),
            Err(e) => return Err(e),
        };
        Ok(Self { dir, associations })
    }

    pub fn document_path(&self) -> PathBuf {
        self.dir.join(ASSOCIATION_FILE_NAME)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn associations(&self) -> &AssociationMatrix {
        &self.associations
    }

    pub fn record(&self, room: &str) -> Option<&TransformRecord> {
        self.associations.get(room)
    }

    pub fn has_position(&self, room: &str) -> bool {
        self.record(room).is_some_and(TransformRecord::has_position)
    }

    /// Opens a session for `room`, adding an identity entry if the room is new.
    pub fn start_positioning(
        &mut self,
        room: &str,
        config: RegistrationConfig,
    ) -> Result<PositioningSession> {
        let record = *self
            .associations
            .entry(room.to_string())
            .or_insert_with(TransformRecord::identity);
        PositioningSession::new(room, record, config)
    }

    /// Stores the session's record and merges it into the floor document.
    pub fn commit(&mut self, session: &PositioningSession) -> Result<()> {
        if session.is_busy() {
            return Err(Error::SessionBusy(session.room.clone()));
        }
        self.associations
            .insert(session.room.clone(), session.record);
        save_room(self.document_path(), &session.room, &session.record)
    }

    /// Forgets a deleted room, here and in the floor document.
    pub fn delete_room(&mut self, room: &str) -> Result<()> {
        if self.associations.remove(room).is_none() {
            return Err(Error::UnknownRoom(room.to_string()));
        }
        remove_rooms(self.document_path(), &[room])
    }

    /// Merges every in-memory record into the floor document.
    pub fn save(&self) -> Result<()> {
        save_association_matrix(self.document_path(), &self.associations)
    }
}
