// src/sql.rs

//! Built-in SQL for the song plays workflow.
//!
//! Each `*_TABLE_INSERT` is the `SELECT` half of an `INSERT INTO ... SELECT`;
//! its column order matches the target table in [`CREATE_TABLES`].

pub const SONGPLAY_TABLE_INSERT: &str = "
    SELECT
        events.sessionid || '-' || events.ts AS playid,
        events.start_time,
        events.userid,
        events.level,
        songs.song_id,
        songs.artist_id,
        events.sessionid,
        events.location,
        events.useragent
    FROM (
        SELECT datetime(ts / 1000, 'unixepoch') AS start_time, *
        FROM staging_events
        WHERE page = 'NextSong'
    ) events
    LEFT JOIN staging_songs songs
        ON events.song = songs.title
        AND events.artist = songs.artist_name
        AND events.length = songs.duration
";

pub const USER_TABLE_INSERT: &str = "
    SELECT DISTINCT userid, firstname, lastname, gender, level
    FROM staging_events
    WHERE page = 'NextSong'
";

pub const SONG_TABLE_INSERT: &str = "
    SELECT DISTINCT song_id, title, artist_id, year, duration
    FROM staging_songs
";

pub const ARTIST_TABLE_INSERT: &str = "
    SELECT DISTINCT artist_id, artist_name, artist_location, artist_latitude, artist_longitude
    FROM staging_songs
";

pub const TIME_TABLE_INSERT: &str = "
    SELECT DISTINCT
        start_time,
        CAST(strftime('%H', start_time) AS INTEGER),
        CAST(strftime('%d', start_time) AS INTEGER),
        CAST(strftime('%W', start_time) AS INTEGER),
        CAST(strftime('%m', start_time) AS INTEGER),
        CAST(strftime('%Y', start_time) AS INTEGER),
        CAST(strftime('%w', start_time) AS INTEGER)
    FROM songplays
";

/// Plays whose song or artist could not be matched against the catalogue.
pub const SONGPLAYS_MISSING_KEYS_CHECK: &str =
    "SELECT count(*) FROM songplays WHERE songid IS NULL OR artistid IS NULL";

/// Schema of the staging, fact and dimension tables.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS staging_events (
    artist          TEXT,
    auth            TEXT,
    firstname       TEXT,
    gender          TEXT,
    iteminsession   INTEGER,
    lastname        TEXT,
    length          REAL,
    level           TEXT,
    location        TEXT,
    method          TEXT,
    page            TEXT,
    registration    REAL,
    sessionid       INTEGER,
    song            TEXT,
    status          INTEGER,
    ts              INTEGER,
    useragent       TEXT,
    userid          INTEGER
);

CREATE TABLE IF NOT EXISTS staging_songs (
    num_songs           INTEGER,
    artist_id           TEXT,
    artist_name         TEXT,
    artist_latitude     REAL,
    artist_longitude    REAL,
    artist_location     TEXT,
    song_id             TEXT,
    title               TEXT,
    duration            REAL,
    year                INTEGER
);

CREATE TABLE IF NOT EXISTS songplays (
    playid      TEXT,
    start_time  TEXT NOT NULL,
    userid      INTEGER NOT NULL,
    level       TEXT,
    songid      TEXT,
    artistid    TEXT,
    sessionid   INTEGER,
    location    TEXT,
    user_agent  TEXT
);

CREATE TABLE IF NOT EXISTS users (
    userid      INTEGER NOT NULL,
    first_name  TEXT,
    last_name   TEXT,
    gender      TEXT,
    level       TEXT
);

CREATE TABLE IF NOT EXISTS songs (
    songid      TEXT NOT NULL,
    title       TEXT NOT NULL,
    artistid    TEXT NOT NULL,
    year        INTEGER,
    duration    REAL
);

CREATE TABLE IF NOT EXISTS artists (
    artistid    TEXT NOT NULL,
    name        TEXT,
    location    TEXT,
    lattitude   REAL,
    longitude   REAL
);

CREATE TABLE IF NOT EXISTS "time" (
    start_time  TEXT NOT NULL,
    hour        INTEGER,
    day         INTEGER,
    week        INTEGER,
    month       INTEGER,
    year        INTEGER,
    weekday     INTEGER
);
"#;

/// Look up a built-in `SELECT` by the name used in `query = "..."`.
pub fn query_by_name(name: &str) -> Option<&'static str> {
    match name {
        "songplay_table_insert" => Some(SONGPLAY_TABLE_INSERT),
        "user_table_insert" => Some(USER_TABLE_INSERT),
        "song_table_insert" => Some(SONG_TABLE_INSERT),
        "artist_table_insert" => Some(ARTIST_TABLE_INSERT),
        "time_table_insert" => Some(TIME_TABLE_INSERT),
        _ => None,
    }
}

/// Names accepted by [`query_by_name`].
pub const QUERY_NAMES: &[&str] = &[
    "songplay_table_insert",
    "user_table_insert",
    "song_table_insert",
    "artist_table_insert",
    "time_table_insert",
];
