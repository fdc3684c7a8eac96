//! SQL for the built-in migrations.
//!
//! Every forward batch is idempotent (`IF NOT EXISTS`) so it can be re-run
//! after a crash between the schema change and the version bookkeeping.

/// v1: all entity and junction tables.
pub const V1_CORE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS plants (
    plant_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS exams (
    exam_id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    plant_id        INTEGER NOT NULL REFERENCES plants(plant_id) ON DELETE CASCADE,
    reference_urls  TEXT NOT NULL DEFAULT '[]'   -- JSON array of strings
);

CREATE TABLE IF NOT EXISTS questions (
    question_id             INTEGER PRIMARY KEY AUTOINCREMENT,
    question_text           TEXT NOT NULL,
    answer_a                TEXT NOT NULL,
    answer_b                TEXT NOT NULL,
    answer_c                TEXT NOT NULL,
    answer_d                TEXT NOT NULL,
    answer_a_justification  TEXT NOT NULL DEFAULT '',
    answer_b_justification  TEXT NOT NULL DEFAULT '',
    answer_c_justification  TEXT NOT NULL DEFAULT '',
    answer_d_justification  TEXT NOT NULL DEFAULT '',
    correct_answer          TEXT NOT NULL CHECK (correct_answer IN ('A', 'B', 'C', 'D')),
    exam_level              INTEGER NOT NULL CHECK (exam_level IN (0, 1)),       -- 0 RO, 1 SRO
    cognitive_level         INTEGER NOT NULL CHECK (cognitive_level IN (0, 1)),  -- 0 memory, 1 comprehension
    technical_references    TEXT,
    references_provided     TEXT,
    objective               TEXT
);

CREATE TABLE IF NOT EXISTS systems (
    system_number  TEXT PRIMARY KEY,
    name           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stems (
    stem_id    TEXT PRIMARY KEY,
    statement  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kas (
    ka_number  TEXT PRIMARY KEY,
    stem_id    TEXT NOT NULL REFERENCES stems(stem_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS system_kas (
    system_number     TEXT NOT NULL REFERENCES systems(system_number) ON DELETE CASCADE,
    ka_number         TEXT NOT NULL REFERENCES kas(ka_number) ON DELETE CASCADE,
    system_ka_number  TEXT GENERATED ALWAYS AS (system_number || ka_number) STORED,
    category          TEXT,
    ro_importance     REAL,
    sro_importance    REAL,
    cfr_content       TEXT,
    PRIMARY KEY (system_number, ka_number),
    UNIQUE (system_ka_number)
);

-- Placement of a question on an exam. main_system_ka_number must name a
-- system KA linked to the same question in question_system_kas; that rule is
-- enforced by the store, not by a constraint.
CREATE TABLE IF NOT EXISTS exam_questions (
    exam_id                  INTEGER NOT NULL REFERENCES exams(exam_id) ON DELETE CASCADE,
    question_id              INTEGER NOT NULL REFERENCES questions(question_id) ON DELETE CASCADE,
    question_number          INTEGER NOT NULL CHECK (question_number >= 1),
    main_system_ka_number    TEXT,
    ka_match_justification   TEXT,
    sro_match_justification  TEXT,
    answers_order            TEXT,
    PRIMARY KEY (exam_id, question_id),
    UNIQUE (exam_id, question_number)
);

CREATE TABLE IF NOT EXISTS question_system_kas (
    question_id    INTEGER NOT NULL REFERENCES questions(question_id) ON DELETE CASCADE,
    system_number  TEXT NOT NULL,
    ka_number      TEXT NOT NULL,
    PRIMARY KEY (question_id, system_number, ka_number),
    FOREIGN KEY (system_number, ka_number)
        REFERENCES system_kas(system_number, ka_number) ON DELETE CASCADE
);
";

/// v2: lookup indexes for the junction reads the aggregator batches over.
pub const V2_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS exams_plant_idx              ON exams(plant_id);
CREATE INDEX IF NOT EXISTS kas_stem_idx                 ON kas(stem_id);
CREATE INDEX IF NOT EXISTS system_kas_ka_idx            ON system_kas(ka_number);
CREATE INDEX IF NOT EXISTS exam_questions_question_idx  ON exam_questions(question_id);
CREATE INDEX IF NOT EXISTS question_system_kas_ka_idx   ON question_system_kas(system_number, ka_number);
";

pub const V2_INDEXES_DOWN: &str = "
DROP INDEX IF EXISTS exams_plant_idx;
DROP INDEX IF EXISTS kas_stem_idx;
DROP INDEX IF EXISTS system_kas_ka_idx;
DROP INDEX IF EXISTS exam_questions_question_idx;
DROP INDEX IF EXISTS question_system_kas_ka_idx;
";

/// v3: clear a primary system KA pointer whose link row goes away, including
/// through a cascade from `systems`, `kas`, or `system_kas`.
pub const V3_PRIMARY_KA_TRIGGER: &str = "
CREATE TRIGGER IF NOT EXISTS question_system_kas_unlink
AFTER DELETE ON question_system_kas
BEGIN
    UPDATE exam_questions
       SET main_system_ka_number = NULL
     WHERE question_id = OLD.question_id
       AND main_system_ka_number = OLD.system_number || OLD.ka_number;
END;
";

pub const V3_PRIMARY_KA_TRIGGER_DOWN: &str = "
DROP TRIGGER IF EXISTS question_system_kas_unlink;
";
