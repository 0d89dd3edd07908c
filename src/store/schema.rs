use super::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Bool,
    /// RFC 3339 text; compared by instant, not by spelling.
    Timestamp,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

const TASK_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Integer),
    col("title", ColumnKind::Text),
    col("description", ColumnKind::Text),
    col("priority", ColumnKind::Text),
    col("energyLevel", ColumnKind::Integer),
    col("emotionalImportance", ColumnKind::Integer),
    col("estimatedTime", ColumnKind::Integer),
    col("actualTime", ColumnKind::Integer),
    col("context", ColumnKind::Text),
    col("status", ColumnKind::Text),
    col("dueDate", ColumnKind::Timestamp),
    col("createdAt", ColumnKind::Timestamp),
    col("completedAt", ColumnKind::Timestamp),
    col("userId", ColumnKind::Text),
];

const STEP_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Integer),
    col("taskId", ColumnKind::Integer),
    col("stepTitle", ColumnKind::Text),
    col("stepDescription", ColumnKind::Text),
    col("isCompleted", ColumnKind::Bool),
];

const BRAIN_DUMP_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Integer),
    col("content", ColumnKind::Text),
    col("createdAt", ColumnKind::Timestamp),
    col("userId", ColumnKind::Text),
];

const ACHIEVEMENT_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Integer),
    col("title", ColumnKind::Text),
    col("description", ColumnKind::Text),
    col("createdAt", ColumnKind::Timestamp),
    col("userId", ColumnKind::Text),
];

const STREAK_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Integer),
    col("count", ColumnKind::Integer),
    col("lastCompletedAt", ColumnKind::Timestamp),
    col("userId", ColumnKind::Text),
];

pub fn columns(table: Table) -> &'static [Column] {
    match table {
        Table::Tasks => TASK_COLUMNS,
        Table::TaskBreakdowns => STEP_COLUMNS,
        Table::BrainDumps => BRAIN_DUMP_COLUMNS,
        Table::Achievements => ACHIEVEMENT_COLUMNS,
        Table::Streaks => STREAK_COLUMNS,
    }
}

pub fn column(table: Table, name: &str) -> Option<Column> {
    columns(table).iter().copied().find(|column| column.name == name)
}

pub const CREATE_TASKS: &str = r#"
CREATE TABLE IF NOT EXISTS "tasks" (
  "id"                  INTEGER PRIMARY KEY AUTOINCREMENT,
  "title"               TEXT NOT NULL,
  "description"         TEXT,
  "priority"            TEXT NOT NULL DEFAULT 'medium',
  "energyLevel"         INTEGER NOT NULL DEFAULT 3,
  "emotionalImportance" INTEGER NOT NULL DEFAULT 50,
  "estimatedTime"       INTEGER,
  "actualTime"          INTEGER,
  "context"             TEXT NOT NULL,
  "status"              TEXT NOT NULL DEFAULT 'active',
  "dueDate"             TEXT,
  "createdAt"           TEXT NOT NULL,
  "completedAt"         TEXT,
  "userId"              TEXT NOT NULL
);
"#;

pub const CREATE_TASK_BREAKDOWNS: &str = r#"
CREATE TABLE IF NOT EXISTS "taskBreakdowns" (
  "id"              INTEGER PRIMARY KEY AUTOINCREMENT,
  "taskId"          INTEGER NOT NULL,
  "stepTitle"       TEXT NOT NULL,
  "stepDescription" TEXT,
  "isCompleted"     INTEGER NOT NULL DEFAULT 0
);
"#;

pub const CREATE_BRAIN_DUMPS: &str = r#"
CREATE TABLE IF NOT EXISTS "brainDumps" (
  "id"        INTEGER PRIMARY KEY AUTOINCREMENT,
  "content"   TEXT NOT NULL,
  "createdAt" TEXT NOT NULL,
  "userId"    TEXT NOT NULL
);
"#;

pub const CREATE_ACHIEVEMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS "achievements" (
  "id"          INTEGER PRIMARY KEY AUTOINCREMENT,
  "title"       TEXT NOT NULL,
  "description" TEXT NOT NULL,
  "createdAt"   TEXT NOT NULL,
  "userId"      TEXT NOT NULL
);
"#;

pub const CREATE_STREAKS: &str = r#"
CREATE TABLE IF NOT EXISTS "streaks" (
  "id"              INTEGER PRIMARY KEY AUTOINCREMENT,
  "count"           INTEGER NOT NULL DEFAULT 0,
  "lastCompletedAt" TEXT NOT NULL,
  "userId"          TEXT NOT NULL UNIQUE
);
"#;

pub const INDEX_TASKS_USER: &str =
    r#"CREATE INDEX IF NOT EXISTS idx_tasks_user ON "tasks"("userId", "createdAt");"#;

pub const INDEX_STEPS_TASK: &str =
    r#"CREATE INDEX IF NOT EXISTS idx_task_breakdowns_task ON "taskBreakdowns"("taskId");"#;

pub const INDEX_BRAIN_DUMPS_USER: &str =
    r#"CREATE INDEX IF NOT EXISTS idx_brain_dumps_user ON "brainDumps"("userId", "createdAt");"#;

pub const INDEX_ACHIEVEMENTS_USER: &str = r#"CREATE INDEX IF NOT EXISTS idx_achievements_user ON "achievements"("userId", "createdAt");"#;

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_TASKS,
        CREATE_TASK_BREAKDOWNS,
        CREATE_BRAIN_DUMPS,
        CREATE_ACHIEVEMENTS,
        CREATE_STREAKS,
        INDEX_TASKS_USER,
        INDEX_STEPS_TASK,
        INDEX_BRAIN_DUMPS_USER,
        INDEX_ACHIEVEMENTS_USER,
    ]
}
