use super::Migration;

/// Built-in schema, oldest first
pub static MIGRATIONS: &[Migration] = &[
    Migration {
        id: "0001_create_groups",
        postgres: &[r#"CREATE TABLE IF NOT EXISTS "groups" (
            id SERIAL PRIMARY KEY,
            guid VARCHAR(255) UNIQUE,
            type VARCHAR(255) DEFAULT 'app'
        )"#],
        mysql: &["CREATE TABLE IF NOT EXISTS `groups` (
            id INT NOT NULL AUTO_INCREMENT,
            guid VARCHAR(255),
            type VARCHAR(255) DEFAULT 'app',
            PRIMARY KEY (id),
            UNIQUE (guid)
        )"],
        sqlite: &[r#"CREATE TABLE IF NOT EXISTS "groups" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            guid VARCHAR(255) UNIQUE,
            type VARCHAR(255) DEFAULT 'app'
        )"#],
    },
    Migration {
        id: "0002_create_destinations",
        postgres: &[r#"CREATE TABLE IF NOT EXISTS destinations (
            id SERIAL PRIMARY KEY,
            group_id INT REFERENCES "groups"(id),
            port INT NOT NULL DEFAULT 0,
            start_port INT NOT NULL,
            end_port INT NOT NULL,
            protocol VARCHAR(255) NOT NULL,
            UNIQUE (group_id, start_port, end_port, protocol)
        )"#],
        mysql: &["CREATE TABLE IF NOT EXISTS destinations (
            id INT NOT NULL AUTO_INCREMENT,
            group_id INT,
            port INT NOT NULL DEFAULT 0,
            start_port INT NOT NULL,
            end_port INT NOT NULL,
            protocol VARCHAR(255) NOT NULL,
            PRIMARY KEY (id),
            UNIQUE (group_id, start_port, end_port, protocol),
            FOREIGN KEY (group_id) REFERENCES `groups`(id)
        )"],
        sqlite: &[r#"CREATE TABLE IF NOT EXISTS destinations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id INTEGER REFERENCES "groups"(id),
            port INTEGER NOT NULL DEFAULT 0,
            start_port INTEGER NOT NULL,
            end_port INTEGER NOT NULL,
            protocol VARCHAR(255) NOT NULL,
            UNIQUE (group_id, start_port, end_port, protocol)
        )"#],
    },
    Migration {
        id: "0003_create_policies",
        postgres: &["CREATE TABLE IF NOT EXISTS policies (
            id SERIAL PRIMARY KEY,
            group_id INT REFERENCES \"groups\"(id),
            destination_id INT REFERENCES destinations(id),
            UNIQUE (group_id, destination_id)
        )"],
        mysql: &["CREATE TABLE IF NOT EXISTS policies (
            id INT NOT NULL AUTO_INCREMENT,
            group_id INT,
            destination_id INT,
            PRIMARY KEY (id),
            UNIQUE (group_id, destination_id),
            FOREIGN KEY (group_id) REFERENCES `groups`(id),
            FOREIGN KEY (destination_id) REFERENCES destinations(id)
        )"],
        sqlite: &["CREATE TABLE IF NOT EXISTS policies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id INTEGER REFERENCES \"groups\"(id),
            destination_id INTEGER REFERENCES destinations(id),
            UNIQUE (group_id, destination_id)
        )"],
    },
    Migration {
        id: "0004_create_ip_ranges",
        postgres: &["CREATE TABLE IF NOT EXISTS ip_ranges (
            id SERIAL PRIMARY KEY,
            group_id INT REFERENCES \"groups\"(id),
            start_ip TEXT DEFAULT '',
            end_ip TEXT DEFAULT '',
            UNIQUE (group_id)
        )"],
        mysql: &["CREATE TABLE IF NOT EXISTS ip_ranges (
            id INT NOT NULL AUTO_INCREMENT,
            group_id INT,
            start_ip VARCHAR(255) DEFAULT '',
            end_ip VARCHAR(255) DEFAULT '',
            PRIMARY KEY (id),
            UNIQUE (group_id),
            FOREIGN KEY (group_id) REFERENCES `groups`(id)
        )"],
        sqlite: &["CREATE TABLE IF NOT EXISTS ip_ranges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id INTEGER REFERENCES \"groups\"(id),
            start_ip TEXT DEFAULT '',
            end_ip TEXT DEFAULT '',
            UNIQUE (group_id)
        )"],
    },
    Migration {
        id: "0005_index_policy_destinations",
        postgres: &["CREATE INDEX IF NOT EXISTS idx_policies_destination ON policies (destination_id)"],
        mysql: &["CREATE INDEX idx_policies_destination ON policies (destination_id)"],
        sqlite: &["CREATE INDEX IF NOT EXISTS idx_policies_destination ON policies (destination_id)"],
    },
];
