//! SQL schema for the facematch database.

/// Tables and indexes, created on open when absent.
///
/// `face_images.cropped_img_id` is not unique; readers de-duplicate.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT NOT NULL UNIQUE,
    password_hash   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS original_images (
    img_id          TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS face_images (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    original_img_id TEXT NOT NULL,
    cropped_img_id  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_face_images_original ON face_images(original_img_id);
CREATE INDEX IF NOT EXISTS idx_face_images_cropped ON face_images(cropped_img_id);

CREATE TABLE IF NOT EXISTS matches (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    img_id_1        TEXT NOT NULL,
    img_id_2        TEXT NOT NULL,
    distance_score  REAL NOT NULL CHECK (distance_score >= 0)
);

CREATE INDEX IF NOT EXISTS idx_matches_img_id_1 ON matches(img_id_1);

CREATE TABLE IF NOT EXISTS pending_face_images (
    original_img_id TEXT PRIMARY KEY
);
"#;
