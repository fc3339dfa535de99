pub const SCHEMA: &str = r#"
-- Single store-wide counter; every tiddler write takes the next value
CREATE TABLE IF NOT EXISTS version_counter (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    value INTEGER NOT NULL
);
INSERT OR IGNORE INTO version_counter (id, value) VALUES (1, 0);

-- Bags hold current-state tiddlers
CREATE TABLE IF NOT EXISTS bags (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    owner TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Attachments are content-addressed and shared by every tiddler that cites them
CREATE TABLE IF NOT EXISTS attachments (
    hash TEXT PRIMARY KEY,
    size INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

-- One row per (bag, title); tombstones keep the slot
CREATE TABLE IF NOT EXISTS tiddlers (
    bag_id TEXT NOT NULL REFERENCES bags(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    version INTEGER NOT NULL UNIQUE,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    attachment_hash TEXT REFERENCES attachments(hash),
    modified TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (bag_id, title)
);

-- Fields belong to one tiddler version and are discarded when it is rewritten
CREATE TABLE IF NOT EXISTS fields (
    version INTEGER NOT NULL REFERENCES tiddlers(version) ON DELETE CASCADE,
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (version, name)
);

-- Recipes compose bags into one view
CREATE TABLE IF NOT EXISTS recipes (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    owner TEXT,
    skip_required_plugins INTEGER NOT NULL DEFAULT 0,
    skip_core INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS recipe_plugins (
    recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    PRIMARY KEY (recipe_id, name)
);

-- Recipe <-> bag join; position orders the stack
CREATE TABLE IF NOT EXISTS recipe_layers (
    recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
    bag_id TEXT NOT NULL REFERENCES bags(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    with_acl INTEGER NOT NULL DEFAULT 0,
    load_modules INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (recipe_id, bag_id)
);

CREATE TABLE IF NOT EXISTS roles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    last_login TEXT
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, role_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    session_key TEXT UNIQUE,
    created_at TEXT DEFAULT (datetime('now')),
    last_accessed TEXT DEFAULT (datetime('now'))
);

-- Permission: 1 = read, 2 = write, 3 = admin
CREATE TABLE IF NOT EXISTS recipe_acl (
    role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
    permission INTEGER NOT NULL CHECK (permission IN (1, 2, 3)),
    PRIMARY KEY (role_id, recipe_id)
);

CREATE TABLE IF NOT EXISTS bag_acl (
    role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    bag_id TEXT NOT NULL REFERENCES bags(id) ON DELETE CASCADE,
    permission INTEGER NOT NULL CHECK (permission IN (1, 2, 3)),
    PRIMARY KEY (role_id, bag_id)
);

CREATE INDEX IF NOT EXISTS idx_tiddlers_bag_version ON tiddlers(bag_id, version);
CREATE INDEX IF NOT EXISTS idx_recipe_layers_bag ON recipe_layers(bag_id);
CREATE INDEX IF NOT EXISTS idx_user_roles_role ON user_roles(role_id);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_recipe_acl_recipe ON recipe_acl(recipe_id);
CREATE INDEX IF NOT EXISTS idx_bag_acl_bag ON bag_acl(bag_id);
"#;
