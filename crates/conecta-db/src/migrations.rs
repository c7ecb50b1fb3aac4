use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Ordered schema steps. Each entry is applied once and recorded in
/// `schema_version`; never edit a step that has shipped, append a new one.
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "initial schema", V1_INITIAL),
    (2, "messages and password resets", V2_MESSAGES_RESETS),
];

const V1_INITIAL: &str = "
    CREATE TABLE users (
        id          TEXT PRIMARY KEY,
        email       TEXT NOT NULL UNIQUE,
        password    TEXT NOT NULL,
        name        TEXT NOT NULL,
        bio         TEXT,
        location    TEXT,
        skills      TEXT NOT NULL DEFAULT '[]',
        interests   TEXT NOT NULL DEFAULT '[]',
        avatar_url  TEXT,
        completion  INTEGER NOT NULL DEFAULT 0,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    );

    CREATE TABLE roles (
        id          INTEGER PRIMARY KEY,
        name        TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL
    );

    CREATE TABLE user_roles (
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role_id     INTEGER NOT NULL REFERENCES roles(id),
        assigned_at TEXT NOT NULL,
        PRIMARY KEY (user_id, role_id)
    );

    CREATE TABLE connections (
        id            TEXT PRIMARY KEY,
        requester_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        addressee_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        status        TEXT NOT NULL DEFAULT 'pending',
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL,
        CHECK (requester_id != addressee_id)
    );

    -- one row per unordered pair
    CREATE UNIQUE INDEX idx_connections_pair
        ON connections(min(requester_id, addressee_id), max(requester_id, addressee_id));
    CREATE INDEX idx_connections_addressee ON connections(addressee_id);

    CREATE TABLE opportunities (
        id          TEXT PRIMARY KEY,
        title       TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        skills      TEXT NOT NULL DEFAULT '[]',
        status      TEXT NOT NULL DEFAULT 'open',
        creator_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    );

    CREATE INDEX idx_opportunities_created ON opportunities(created_at);

    CREATE TABLE opportunity_interests (
        id              TEXT PRIMARY KEY,
        opportunity_id  TEXT NOT NULL REFERENCES opportunities(id) ON DELETE CASCADE,
        user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        message         TEXT NOT NULL DEFAULT '',
        status          TEXT NOT NULL DEFAULT 'pending',
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL,
        UNIQUE(opportunity_id, user_id)
    );

    -- user ids are plain text: audit history outlives the accounts it mentions
    CREATE TABLE role_audit_log (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id       TEXT NOT NULL,
        role_id       INTEGER NOT NULL,
        role_name     TEXT NOT NULL,
        action        TEXT NOT NULL,
        performed_by  TEXT NOT NULL,
        reason        TEXT,
        metadata      TEXT,
        created_at    TEXT NOT NULL
    );

    CREATE INDEX idx_audit_created ON role_audit_log(created_at, id);
    CREATE INDEX idx_audit_user ON role_audit_log(user_id);

    INSERT INTO roles (id, name, description) VALUES
        (1, 'admin', 'Platform administrator'),
        (2, 'mentor', 'Experienced professional offering guidance'),
        (3, 'emprendedor', 'Entrepreneur building a creative venture');
";

const V2_MESSAGES_RESETS: &str = "
    CREATE TABLE messages (
        id            TEXT PRIMARY KEY,
        sender_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        recipient_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content       TEXT NOT NULL,
        created_at    TEXT NOT NULL,
        read_at       TEXT
    );

    CREATE INDEX idx_messages_pair
        ON messages(sender_id, recipient_id, created_at);
    CREATE INDEX idx_messages_unread
        ON messages(recipient_id, read_at);

    CREATE TABLE password_resets (
        token_hash  TEXT PRIMARY KEY,
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        expires_at  TEXT NOT NULL,
        used_at     TEXT
    );
";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    for (step, name, sql) in MIGRATIONS {
        if *step <= version {
            continue;
        }
        info!("Running migration v{} ({})", step, name);
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [step])?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
