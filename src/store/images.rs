//! Image, face, match and pending-marker queries.
//!
//! The HTTP layer only reads these tables and writes pending markers. Rows in
//! `original_images`, `face_images` and `matches` come from the external
//! processing worker through [`Database::record_results`].

use rusqlite::params;
use tracing::debug;

use super::Database;
use crate::error::StoreError;

// =============================================================================
// Types
// =============================================================================

/// Matched image ids and their distances, as parallel sequences.
///
/// Entries come back in database order; no sort is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchList {
    pub imgs: Vec<String>,
    pub distances: Vec<f64>,
}

impl MatchList {
    fn push(&mut self, img_id: String, distance: f64) {
        self.imgs.push(img_id);
        self.distances.push(distance);
    }
}

/// One face-to-face match found by the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    /// Cropped face from the processed image
    pub cropped_img_id: String,

    /// Cropped face it matched against
    pub matched_img_id: String,

    /// Distance between the two embeddings (non-negative)
    pub distance: f64,
}

impl FaceMatch {
    pub fn new(
        cropped_img_id: impl Into<String>,
        matched_img_id: impl Into<String>,
        distance: f64,
    ) -> Self {
        Self {
            cropped_img_id: cropped_img_id.into(),
            matched_img_id: matched_img_id.into(),
            distance,
        }
    }
}

/// Everything the worker produces for one original image.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResults {
    /// The original image id that was processed
    pub img_id: String,

    /// Cropped face ids extracted from the original
    pub faces: Vec<String>,

    /// Matches between those faces and previously known faces
    pub matches: Vec<FaceMatch>,
}

impl ProcessingResults {
    pub fn new(img_id: impl Into<String>) -> Self {
        Self {
            img_id: img_id.into(),
            faces: Vec::new(),
            matches: Vec::new(),
        }
    }

    pub fn with_face(mut self, cropped_img_id: impl Into<String>) -> Self {
        self.faces.push(cropped_img_id.into());
        self
    }

    pub fn with_match(mut self, face_match: FaceMatch) -> Self {
        self.matches.push(face_match);
        self
    }

    fn validate(&self) -> Result<(), StoreError> {
        for m in &self.matches {
            if !m.distance.is_finite() || m.distance < 0.0 {
                return Err(StoreError::InvalidDistance {
                    img_id_1: m.cropped_img_id.clone(),
                    img_id_2: m.matched_img_id.clone(),
                    score: m.distance,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Pending Markers and Status
// =============================================================================

impl Database {
    /// Record that `img_id` is waiting for the worker.
    ///
    /// Returns `true` if a marker was created and `false` if one already
    /// existed. The insert is atomic against concurrent uploads of the same id.
    pub async fn add_pending_marker(&self, img_id: &str) -> Result<bool, StoreError> {
        let id = img_id.to_string();
        let inserted = self
            .write(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO pending_face_images (original_img_id) VALUES (?1)",
                    params![id],
                )
            })
            .await?;

        debug!(img_id = img_id, created = inserted > 0, "Pending marker");
        Ok(inserted > 0)
    }

    /// Whether a pending marker exists for `img_id`.
    pub async fn is_pending(&self, img_id: &str) -> Result<bool, StoreError> {
        self.exists(
            "SELECT EXISTS(SELECT 1 FROM pending_face_images WHERE original_img_id = ?1)",
            img_id,
        )
        .await
    }

    /// Whether the worker has finished with `img_id`.
    pub async fn is_processed(&self, img_id: &str) -> Result<bool, StoreError> {
        self.exists(
            "SELECT EXISTS(SELECT 1 FROM original_images WHERE img_id = ?1)",
            img_id,
        )
        .await
    }

    async fn exists(&self, sql: &'static str, img_id: &str) -> Result<bool, StoreError> {
        let id = img_id.to_string();
        self.read(move |conn| conn.query_row(sql, params![id], |row| row.get(0)))
            .await
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// All processed original image ids.
    pub async fn original_image_ids(&self) -> Result<Vec<String>, StoreError> {
        self.read(|conn| {
            let mut stmt = conn.prepare("SELECT img_id FROM original_images ORDER BY img_id")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>();
            ids
        })
        .await
    }

    /// Distinct original image ids that contain the given cropped face.
    pub async fn original_ids_for_crop(&self, crop_img_id: &str) -> Result<Vec<String>, StoreError> {
        self.list_ids(
            "SELECT DISTINCT original_img_id FROM face_images WHERE cropped_img_id = ?1",
            crop_img_id,
        )
        .await
    }

    /// Distinct cropped face ids extracted from the given original image.
    pub async fn cropped_ids_for_original(
        &self,
        orig_img_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.list_ids(
            "SELECT DISTINCT cropped_img_id FROM face_images WHERE original_img_id = ?1",
            orig_img_id,
        )
        .await
    }

    async fn list_ids(&self, sql: &'static str, img_id: &str) -> Result<Vec<String>, StoreError> {
        let id = img_id.to_string();
        self.read(move |conn| {
            let mut stmt = conn.prepare(sql)?;
            let ids = stmt
                .query_map(params![id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>();
            ids
        })
        .await
    }

    // =========================================================================
    // Matches
    // =========================================================================

    /// Faces matched against one cropped face.
    pub async fn cropped_image_matches(&self, img_id: &str) -> Result<MatchList, StoreError> {
        self.match_list(
            "SELECT img_id_2, distance_score FROM matches WHERE img_id_1 = ?1",
            img_id,
        )
        .await
    }

    /// Other originals whose faces matched any face in this original.
    ///
    /// Each face-level match contributes one entry; matches that land back in
    /// the same original are left out.
    pub async fn original_image_matches(&self, img_id: &str) -> Result<MatchList, StoreError> {
        self.match_list(
            r#"
            SELECT target.original_img_id, m.distance_score
            FROM matches m
            JOIN (SELECT DISTINCT cropped_img_id
                  FROM face_images WHERE original_img_id = ?1) source
              ON m.img_id_1 = source.cropped_img_id
            JOIN (SELECT DISTINCT cropped_img_id, original_img_id
                  FROM face_images) target
              ON m.img_id_2 = target.cropped_img_id
            WHERE target.original_img_id <> ?1
            "#,
            img_id,
        )
        .await
    }

    async fn match_list(&self, sql: &'static str, img_id: &str) -> Result<MatchList, StoreError> {
        let id = img_id.to_string();
        self.read(move |conn| {
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query(params![id])?;
            let mut list = MatchList::default();
            while let Some(row) = rows.next()? {
                list.push(row.get(0)?, row.get(1)?);
            }
            Ok(list)
        })
        .await
    }

    // =========================================================================
    // Worker Results
    // =========================================================================

    /// Store the worker's output for one original image.
    ///
    /// In a single transaction: inserts the original image row, its faces and
    /// both directions of every match, then removes the pending marker.
    pub async fn record_results(&self, results: ProcessingResults) -> Result<(), StoreError> {
        results.validate()?;

        let img_id = results.img_id.clone();
        let face_count = results.faces.len();
        let match_count = results.matches.len();

        self.write(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO original_images (img_id) VALUES (?1)",
                params![results.img_id],
            )?;

            let mut face_stmt = conn.prepare_cached(
                "INSERT INTO face_images (original_img_id, cropped_img_id) VALUES (?1, ?2)",
            )?;
            for face in &results.faces {
                face_stmt.execute(params![results.img_id, face])?;
            }

            let mut match_stmt = conn.prepare_cached(
                "INSERT INTO matches (img_id_1, img_id_2, distance_score) VALUES (?1, ?2, ?3)",
            )?;
            for m in &results.matches {
                match_stmt.execute(params![m.cropped_img_id, m.matched_img_id, m.distance])?;
                match_stmt.execute(params![m.matched_img_id, m.cropped_img_id, m.distance])?;
            }

            conn.execute(
                "DELETE FROM pending_face_images WHERE original_img_id = ?1",
                params![results.img_id],
            )?;
            Ok(())
        })
        .await?;

        debug!(
            img_id = %img_id,
            faces = face_count,
            matches = match_count,
            "Recorded processing results"
        );
        Ok(())
    }
}
