use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use log::debug;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{IVec, Transactional};
use uuid::Uuid;

use crate::mission::errors::MissionError;
use crate::mission::state::{seed_starter_missions, seed_starter_titles};
use crate::mission::strategy::progress::ActivityStats;
use crate::mission::types::{
    LedgerEntry, LevelTable, MissionRecord, MissionRequirement, Notification, RewardRecord,
    TitleRecord, UserMission, UserMissionProgress, UserRecord, MISSION_SCHEMA_VERSION,
    PROGRESS_SCHEMA_VERSION, USER_SCHEMA_VERSION,
};
use crate::mission::validation::{validate_identifier, validate_username};

const TREE_PRIMARY: &str = "missions";
const TREE_USERS: &str = "mission_users";
const TREE_PROGRESS: &str = "mission_progress";
const TREE_LEDGER: &str = "mission_ledger";
const TREE_ACTIVITY: &str = "mission_activity";
const TREE_MAIL: &str = "mission_mail";
const TREE_LOGS: &str = "mission_logs";

const LEVEL_TABLE_KEY: &[u8] = b"levels:table";

static LAST_KEY_NANOS: AtomicI64 = AtomicI64::new(0);

/// Strictly increasing within the process so append-only keys never collide.
fn next_timestamp_nanos() -> i64 {
    let now = Utc::now();
    let candidate = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros() * 1000);
    let mut last = LAST_KEY_NANOS.load(Ordering::SeqCst);
    loop {
        let next = candidate.max(last + 1);
        match LAST_KEY_NANOS.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next,
            Err(seen) => last = seen,
        }
    }
}

fn user_part(username: &str) -> String {
    username.to_ascii_lowercase()
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct MissionStoreBuilder {
    path: PathBuf,
    seed_starter_content: bool,
}

impl MissionStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seed_starter_content: false,
        }
    }

    /// Insert the starter titles and missions when the store has no missions yet.
    pub fn with_starter_content(mut self) -> Self {
        self.seed_starter_content = true;
        self
    }

    pub fn open(self) -> Result<MissionStore, MissionError> {
        MissionStore::open_with_options(self.path, self.seed_starter_content)
    }
}

/// Sled-backed persistence for missions, per-user progress and the reward collaborators.
#[derive(Clone)]
pub struct MissionStore {
    _db: sled::Db,
    primary: sled::Tree,
    users: sled::Tree,
    progress: sled::Tree,
    ledger: sled::Tree,
    activity: sled::Tree,
    mail: sled::Tree,
    logs: sled::Tree,
}

impl MissionStore {
    /// Open (or create) the mission store rooted at `path` without seeding content.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MissionError> {
        Self::open_with_options(path, false)
    }

    fn open_with_options<P: AsRef<Path>>(path: P, seed: bool) -> Result<Self, MissionError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let store = Self {
            primary: db.open_tree(TREE_PRIMARY)?,
            users: db.open_tree(TREE_USERS)?,
            progress: db.open_tree(TREE_PROGRESS)?,
            ledger: db.open_tree(TREE_LEDGER)?,
            activity: db.open_tree(TREE_ACTIVITY)?,
            mail: db.open_tree(TREE_MAIL)?,
            logs: db.open_tree(TREE_LOGS)?,
            _db: db,
        };

        if seed {
            store.seed_starter_content_if_needed()?;
        }

        Ok(store)
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, MissionError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, MissionError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    fn check_schema(entity: &'static str, expected: u8, found: u8) -> Result<(), MissionError> {
        if expected != found {
            return Err(MissionError::SchemaMismatch {
                entity,
                expected,
                found,
            });
        }
        Ok(())
    }

    fn scan<T: serde::de::DeserializeOwned>(
        tree: &sled::Tree,
        prefix: &str,
    ) -> Result<Vec<T>, MissionError> {
        tree.scan_prefix(prefix.as_bytes())
            .map(|entry| {
                entry
                    .map_err(MissionError::from)
                    .and_then(|(_key, value)| Self::deserialize(value))
            })
            .collect()
    }

    fn count_prefix(tree: &sled::Tree, prefix: &str) -> usize {
        tree.scan_prefix(prefix.as_bytes()).count()
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    fn user_key(username: &str) -> Vec<u8> {
        format!("users:{}", user_part(username)).into_bytes()
    }

    /// Insert or update a user record.
    pub fn put_user(&self, mut user: UserRecord) -> Result<(), MissionError> {
        validate_username(&user.username)?;
        user.schema_version = USER_SCHEMA_VERSION;
        user.touch();
        let bytes = Self::serialize(&user)?;
        self.users.insert(Self::user_key(&user.username), bytes)?;
        self.users.flush()?;
        Ok(())
    }

    /// Fetch a user record by username.
    pub fn get_user(&self, username: &str) -> Result<UserRecord, MissionError> {
        let Some(bytes) = self.users.get(Self::user_key(username))? else {
            return Err(MissionError::NotFound(format!("user: {}", username)));
        };
        let record: UserRecord = Self::deserialize(bytes)?;
        Self::check_schema("user", USER_SCHEMA_VERSION, record.schema_version)?;
        Ok(record)
    }

    /// Fetch a user, creating a fresh record when none exists yet.
    pub fn ensure_user(&self, username: &str) -> Result<UserRecord, MissionError> {
        match self.get_user(username) {
            Ok(user) => Ok(user),
            Err(MissionError::NotFound(_)) => {
                validate_username(username)?;
                let user = UserRecord::new(username, username);
                let bytes = Self::serialize(&user)?;
                let created = self
                    .users
                    .compare_and_swap(Self::user_key(username), None::<&[u8]>, Some(bytes))?;
                if created.is_err() {
                    // another writer created it first
                    return self.get_user(username);
                }
                self.users.flush()?;
                debug!("created user record for {}", username);
                Ok(user)
            }
            Err(e) => Err(e),
        }
    }

    /// Read-modify-write a user record atomically, creating it if missing.
    ///
    /// `apply` may run more than once when another writer races on the same
    /// user; it must only mutate the record it is handed. An error from
    /// `apply` aborts without writing.
    pub fn update_user<F>(&self, username: &str, mut apply: F) -> Result<UserRecord, MissionError>
    where
        F: FnMut(&mut UserRecord) -> Result<(), MissionError>,
    {
        validate_username(username)?;
        let key = Self::user_key(username);
        loop {
            let current = self.users.get(&key)?;
            let mut user = match &current {
                Some(bytes) => {
                    let record: UserRecord = Self::deserialize(bytes.clone())?;
                    Self::check_schema("user", USER_SCHEMA_VERSION, record.schema_version)?;
                    record
                }
                None => UserRecord::new(username, username),
            };
            apply(&mut user)?;
            user.schema_version = USER_SCHEMA_VERSION;
            user.touch();
            let bytes = Self::serialize(&user)?;
            if self
                .users
                .compare_and_swap(&key, current, Some(bytes))?
                .is_ok()
            {
                self.users.flush()?;
                return Ok(user);
            }
        }
    }

    /// List all usernames currently stored.
    pub fn list_usernames(&self) -> Result<Vec<String>, MissionError> {
        let mut ids = Vec::new();
        for entry in self.users.scan_prefix(b"users:") {
            let (key, _) = entry?;
            let text = std::str::from_utf8(&key)?;
            if let Some(username) = text.strip_prefix("users:") {
                ids.push(username.to_string());
            }
        }
        Ok(ids)
    }

    // ------------------------------------------------------------------------
    // Missions, requirements, rewards
    // ------------------------------------------------------------------------

    fn mission_key(mission_id: &str) -> Vec<u8> {
        format!("missions:{}", mission_id).into_bytes()
    }

    pub fn put_mission(&self, mut mission: MissionRecord) -> Result<(), MissionError> {
        validate_identifier("mission id", &mission.id)?;
        mission.schema_version = MISSION_SCHEMA_VERSION;
        let bytes = Self::serialize(&mission)?;
        self.primary.insert(Self::mission_key(&mission.id), bytes)?;
        self.primary.flush()?;
        Ok(())
    }

    pub fn get_mission(&self, mission_id: &str) -> Result<MissionRecord, MissionError> {
        let Some(bytes) = self.primary.get(Self::mission_key(mission_id))? else {
            return Err(MissionError::NotFound(format!("mission: {}", mission_id)));
        };
        let record: MissionRecord = Self::deserialize(bytes)?;
        Self::check_schema("mission", MISSION_SCHEMA_VERSION, record.schema_version)?;
        Ok(record)
    }

    pub fn list_missions(&self) -> Result<Vec<MissionRecord>, MissionError> {
        Self::scan(&self.primary, "missions:")
    }

    pub fn put_requirement(&self, requirement: MissionRequirement) -> Result<(), MissionError> {
        validate_identifier("requirement id", &requirement.id)?;
        validate_identifier("mission id", &requirement.mission_id)?;
        validate_identifier("requirement key", &requirement.key)?;
        let key = format!("requirements:{}:{}", requirement.mission_id, requirement.id);
        self.primary
            .insert(key.into_bytes(), Self::serialize(&requirement)?)?;
        self.primary.flush()?;
        Ok(())
    }

    pub fn remove_requirement(&self, mission_id: &str, requirement_id: &str) -> Result<bool, MissionError> {
        let key = format!("requirements:{}:{}", mission_id, requirement_id);
        let removed = self.primary.remove(key.into_bytes())?.is_some();
        self.primary.flush()?;
        Ok(removed)
    }

    /// Current requirement set of a mission, read fresh from the store.
    pub fn list_requirements(&self, mission_id: &str) -> Result<Vec<MissionRequirement>, MissionError> {
        Self::scan(&self.primary, &format!("requirements:{}:", mission_id))
    }

    /// Every distinct requirement key referenced by any stored mission.
    pub fn list_requirement_keys(&self) -> Result<Vec<String>, MissionError> {
        let requirements: Vec<MissionRequirement> = Self::scan(&self.primary, "requirements:")?;
        let mut keys: Vec<String> = requirements.into_iter().map(|r| r.key).collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    pub fn put_reward(&self, reward: RewardRecord) -> Result<(), MissionError> {
        validate_identifier("reward id", &reward.id)?;
        validate_identifier("mission id", &reward.mission_id)?;
        let key = format!("rewards:{}:{}", reward.mission_id, reward.id);
        self.primary.insert(key.into_bytes(), Self::serialize(&reward)?)?;
        self.primary.flush()?;
        Ok(())
    }

    pub fn list_rewards(&self, mission_id: &str) -> Result<Vec<RewardRecord>, MissionError> {
        Self::scan(&self.primary, &format!("rewards:{}:", mission_id))
    }

    /// Remove a mission together with everything that hangs off it: requirements,
    /// rewards, assignments and every user's progress/completion rows.
    pub fn delete_mission(&self, mission_id: &str) -> Result<(), MissionError> {
        let mut doomed_primary: Vec<IVec> = Vec::new();
        for prefix in [
            format!("requirements:{}:", mission_id),
            format!("rewards:{}:", mission_id),
        ] {
            for entry in self.primary.scan_prefix(prefix.as_bytes()) {
                doomed_primary.push(entry?.0);
            }
        }
        for entry in self.primary.scan_prefix(b"assignments:") {
            let (key, _) = entry?;
            if std::str::from_utf8(&key)?.ends_with(&format!(":{}", mission_id)) {
                doomed_primary.push(key);
            }
        }
        for key in doomed_primary {
            self.primary.remove(key)?;
        }
        self.primary.remove(Self::mission_key(mission_id))?;

        let mut doomed_progress: Vec<IVec> = Vec::new();
        for entry in self.progress.iter() {
            let (key, _) = entry?;
            let text = std::str::from_utf8(&key)?;
            // progress:<user>:<mission>:<requirement> and completed:<user>:<mission>
            let parts: Vec<&str> = text.split(':').collect();
            let hit = match parts.as_slice() {
                ["progress", _, mission, _] => *mission == mission_id,
                ["completed", _, mission] => *mission == mission_id,
                _ => false,
            };
            if hit {
                doomed_progress.push(key.clone());
            }
        }
        for key in doomed_progress {
            self.progress.remove(key)?;
        }

        self.primary.flush()?;
        self.progress.flush()?;
        debug!("deleted mission {} and its dependent rows", mission_id);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Assignments (missions that are not `for_all`)
    // ------------------------------------------------------------------------

    fn assignment_key(username: &str, mission_id: &str) -> Vec<u8> {
        format!("assignments:{}:{}", user_part(username), mission_id).into_bytes()
    }

    pub fn assign_mission(&self, username: &str, mission_id: &str) -> Result<(), MissionError> {
        validate_username(username)?;
        validate_identifier("mission id", mission_id)?;
        self.primary
            .insert(Self::assignment_key(username, mission_id), Vec::<u8>::new())?;
        self.primary.flush()?;
        Ok(())
    }

    pub fn is_assigned(&self, username: &str, mission_id: &str) -> Result<bool, MissionError> {
        Ok(self
            .primary
            .contains_key(Self::assignment_key(username, mission_id))?)
    }

    /// Missions the user can see: every `for_all` mission plus their assignments.
    pub fn missions_visible_to(&self, username: &str) -> Result<Vec<MissionRecord>, MissionError> {
        let mut visible = Vec::new();
        for mission in self.list_missions()? {
            if mission.for_all || self.is_assigned(username, &mission.id)? {
                visible.push(mission);
            }
        }
        Ok(visible)
    }

    // ------------------------------------------------------------------------
    // Titles
    // ------------------------------------------------------------------------

    pub fn put_title(&self, title: TitleRecord) -> Result<(), MissionError> {
        validate_identifier("title id", &title.id)?;
        let key = format!("titles:{}", title.id);
        self.primary.insert(key.into_bytes(), Self::serialize(&title)?)?;
        self.primary.flush()?;
        Ok(())
    }

    pub fn get_title(&self, title_id: &str) -> Result<TitleRecord, MissionError> {
        let key = format!("titles:{}", title_id);
        let bytes = self
            .primary
            .get(key.into_bytes())?
            .ok_or_else(|| MissionError::NotFound(format!("title: {}", title_id)))?;
        Self::deserialize(bytes)
    }

    pub fn list_titles(&self) -> Result<Vec<TitleRecord>, MissionError> {
        Self::scan(&self.primary, "titles:")
    }

    // ------------------------------------------------------------------------
    // Progress and completion rows
    // ------------------------------------------------------------------------

    fn progress_key(username: &str, mission_id: &str, requirement_id: &str) -> Vec<u8> {
        format!(
            "progress:{}:{}:{}",
            user_part(username),
            mission_id,
            requirement_id
        )
        .into_bytes()
    }

    fn completion_key(username: &str, mission_id: &str) -> Vec<u8> {
        format!("completed:{}:{}", user_part(username), mission_id).into_bytes()
    }

    /// Insert-or-replace the progress row for (user, requirement). One row per pair.
    /// Requirement ids are scoped to their mission, so the key carries both.
    pub fn upsert_progress(&self, mut row: UserMissionProgress) -> Result<(), MissionError> {
        validate_username(&row.username)?;
        validate_identifier("mission id", &row.mission_id)?;
        validate_identifier("requirement id", &row.requirement_id)?;
        row.schema_version = PROGRESS_SCHEMA_VERSION;
        let key = Self::progress_key(&row.username, &row.mission_id, &row.requirement_id);
        self.progress.insert(key, Self::serialize(&row)?)?;
        self.progress.flush()?;
        Ok(())
    }

    pub fn find_progress(
        &self,
        username: &str,
        mission_id: &str,
        requirement_id: &str,
    ) -> Result<Option<UserMissionProgress>, MissionError> {
        let key = Self::progress_key(username, mission_id, requirement_id);
        let Some(bytes) = self.progress.get(key)? else {
            return Ok(None);
        };
        let row: UserMissionProgress = Self::deserialize(bytes)?;
        Self::check_schema("progress", PROGRESS_SCHEMA_VERSION, row.schema_version)?;
        Ok(Some(row))
    }

    pub fn list_progress(&self, username: &str) -> Result<Vec<UserMissionProgress>, MissionError> {
        Self::scan(&self.progress, &format!("progress:{}:", user_part(username)))
    }

    /// Progress rows of one user on one mission.
    pub fn list_mission_progress(
        &self,
        username: &str,
        mission_id: &str,
    ) -> Result<Vec<UserMissionProgress>, MissionError> {
        Self::scan(
            &self.progress,
            &format!("progress:{}:{}:", user_part(username), mission_id),
        )
    }

    /// Insert-or-replace the completion row for (user, mission).
    pub fn upsert_user_mission(&self, mut row: UserMission) -> Result<(), MissionError> {
        validate_username(&row.username)?;
        validate_identifier("mission id", &row.mission_id)?;
        row.schema_version = PROGRESS_SCHEMA_VERSION;
        let key = Self::completion_key(&row.username, &row.mission_id);
        self.progress.insert(key, Self::serialize(&row)?)?;
        self.progress.flush()?;
        Ok(())
    }

    pub fn find_user_mission(
        &self,
        username: &str,
        mission_id: &str,
    ) -> Result<Option<UserMission>, MissionError> {
        let Some(bytes) = self.progress.get(Self::completion_key(username, mission_id))? else {
            return Ok(None);
        };
        let row: UserMission = Self::deserialize(bytes)?;
        Self::check_schema("user mission", PROGRESS_SCHEMA_VERSION, row.schema_version)?;
        Ok(Some(row))
    }

    /// Exists-where check on (user, mission, completed = true).
    pub fn user_mission_completed(&self, username: &str, mission_id: &str) -> Result<bool, MissionError> {
        Ok(self
            .find_user_mission(username, mission_id)?
            .map(|row| row.completed)
            .unwrap_or(false))
    }

    pub fn list_user_missions(&self, username: &str) -> Result<Vec<UserMission>, MissionError> {
        Self::scan(&self.progress, &format!("completed:{}:", user_part(username)))
    }

    pub fn count_completed_missions(&self, username: &str) -> Result<u32, MissionError> {
        let count = self
            .list_user_missions(username)?
            .iter()
            .filter(|row| row.completed)
            .count();
        Ok(count as u32)
    }

    // ------------------------------------------------------------------------
    // Wallet ledger & level table
    // ------------------------------------------------------------------------

    /// Credit `amount` to a user's balance and append the matching ledger entry
    /// in one transaction across the users and ledger trees. Creates the user
    /// when missing. Either both writes land or neither does.
    pub fn credit_user(
        &self,
        username: &str,
        amount: i64,
        description: &str,
    ) -> Result<LedgerEntry, MissionError> {
        validate_username(username)?;
        let user_key = Self::user_key(username);
        let ledger_key = format!(
            "ledger:{}:{:020}",
            user_part(username),
            next_timestamp_nanos()
        );
        let entry_id = Uuid::new_v4().to_string();

        let outcome = (&self.users, &self.ledger).transaction(|(users, ledger)| {
            let mut user = match users.get(&user_key)? {
                Some(bytes) => {
                    let record: UserRecord =
                        Self::deserialize(bytes).map_err(ConflictableTransactionError::Abort)?;
                    Self::check_schema("user", USER_SCHEMA_VERSION, record.schema_version)
                        .map_err(ConflictableTransactionError::Abort)?;
                    record
                }
                None => UserRecord::new(username, username),
            };
            user.balance = user.balance.checked_add(amount).ok_or_else(|| {
                ConflictableTransactionError::Abort(MissionError::InvalidCurrency(format!(
                    "balance overflow for {}",
                    username
                )))
            })?;
            user.schema_version = USER_SCHEMA_VERSION;
            user.touch();

            let entry = LedgerEntry {
                id: entry_id.clone(),
                username: username.to_string(),
                amount,
                balance_after: user.balance,
                description: description.to_string(),
                timestamp: Utc::now(),
            };
            let user_bytes = Self::serialize(&user).map_err(ConflictableTransactionError::Abort)?;
            let entry_bytes = Self::serialize(&entry).map_err(ConflictableTransactionError::Abort)?;
            users.insert(user_key.as_slice(), user_bytes)?;
            ledger.insert(ledger_key.as_bytes(), entry_bytes)?;
            Ok::<_, ConflictableTransactionError<MissionError>>(entry)
        });
        let entry = outcome.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => MissionError::from(e),
        })?;

        self.users.flush()?;
        self.ledger.flush()?;
        Ok(entry)
    }

    /// Ledger entries for a user, oldest first.
    pub fn list_ledger(&self, username: &str) -> Result<Vec<LedgerEntry>, MissionError> {
        Self::scan(&self.ledger, &format!("ledger:{}:", user_part(username)))
    }

    pub fn put_level_table(&self, table: &LevelTable) -> Result<(), MissionError> {
        self.primary.insert(LEVEL_TABLE_KEY, Self::serialize(table)?)?;
        self.primary.flush()?;
        Ok(())
    }

    pub fn get_level_table(&self) -> Result<Option<LevelTable>, MissionError> {
        match self.primary.get(LEVEL_TABLE_KEY)? {
            Some(bytes) => Ok(Some(Self::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------------
    // Activity counters read by progress strategies
    // ------------------------------------------------------------------------

    fn read_counter(&self, key: &str) -> Result<u32, MissionError> {
        match self.activity.get(key.as_bytes())? {
            Some(bytes) => Self::deserialize(bytes),
            None => Ok(0),
        }
    }

    fn bump_counter(&self, key: String, by: u32) -> Result<u32, MissionError> {
        loop {
            let current = self.activity.get(key.as_bytes())?;
            let before: u32 = match &current {
                Some(bytes) => Self::deserialize(bytes.clone())?,
                None => 0,
            };
            let value = before.saturating_add(by);
            let swapped = self.activity.compare_and_swap(
                key.as_bytes(),
                current,
                Some(Self::serialize(&value)?),
            )?;
            if swapped.is_ok() {
                self.activity.flush()?;
                return Ok(value);
            }
        }
    }

    /// Add `quantity` of an item to the user's holdings; returns the new quantity.
    pub fn add_owned_item(&self, username: &str, item_id: &str, quantity: u32) -> Result<u32, MissionError> {
        validate_username(username)?;
        validate_identifier("item id", item_id)?;
        self.bump_counter(format!("items:{}:{}", user_part(username), item_id), quantity)
    }

    /// Record a friendship; returns false if it already existed.
    pub fn add_friend(&self, username: &str, friend: &str) -> Result<bool, MissionError> {
        validate_username(username)?;
        validate_username(friend)?;
        let key = format!("friends:{}:{}", user_part(username), user_part(friend));
        let inserted = self
            .activity
            .insert(key.into_bytes(), Self::serialize(&1u32)?)?
            .is_none();
        self.activity.flush()?;
        Ok(inserted)
    }

    /// Bump a named interaction counter (`posts_published`, `likes_given`, ...).
    pub fn record_interaction(&self, username: &str, interaction: &str, by: u32) -> Result<u32, MissionError> {
        validate_username(username)?;
        validate_identifier("interaction", interaction)?;
        self.bump_counter(
            format!("interactions:{}:{}", user_part(username), interaction),
            by,
        )
    }

    // ------------------------------------------------------------------------
    // Notifications & diagnostic logs
    // ------------------------------------------------------------------------

    pub fn enqueue_notification(&self, notification: &Notification) -> Result<(), MissionError> {
        let key = format!(
            "mail:{}:{:020}",
            user_part(&notification.username),
            next_timestamp_nanos()
        );
        self.mail.insert(key.into_bytes(), Self::serialize(notification)?)?;
        self.mail.flush()?;
        Ok(())
    }

    pub fn list_notifications(&self, username: &str) -> Result<Vec<Notification>, MissionError> {
        Self::scan(&self.mail, &format!("mail:{}:", user_part(username)))
    }

    /// Append a line to the diagnostic log tree.
    pub fn append_log(&self, message: &str) -> Result<(), MissionError> {
        let key = format!("logs:{:020}", next_timestamp_nanos()).into_bytes();
        self.logs.insert(key, message.as_bytes())?;
        self.logs.flush()?;
        Ok(())
    }

    pub fn list_logs(&self) -> Result<Vec<String>, MissionError> {
        let mut lines = Vec::new();
        for entry in self.logs.scan_prefix(b"logs:") {
            let (_, value) = entry?;
            lines.push(std::str::from_utf8(&value)?.to_string());
        }
        Ok(lines)
    }

    // ------------------------------------------------------------------------
    // Seeding & stats
    // ------------------------------------------------------------------------

    /// Insert starter titles and missions if no mission exists yet. Returns missions inserted.
    pub fn seed_starter_content_if_needed(&self) -> Result<usize, MissionError> {
        if self.primary.scan_prefix(b"missions:").next().is_some() {
            return Ok(0);
        }
        for title in seed_starter_titles() {
            self.put_title(title)?;
        }
        let mut inserted = 0usize;
        for (mission, requirements, rewards) in seed_starter_missions() {
            self.put_mission(mission)?;
            for requirement in requirements {
                self.put_requirement(requirement)?;
            }
            for reward in rewards {
                self.put_reward(reward)?;
            }
            inserted += 1;
        }
        if self.get_level_table()?.is_none() {
            self.put_level_table(&LevelTable::default())?;
        }
        Ok(inserted)
    }

    /// Row counts for status output.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            missions: Self::count_prefix(&self.primary, "missions:"),
            requirements: Self::count_prefix(&self.primary, "requirements:"),
            rewards: Self::count_prefix(&self.primary, "rewards:"),
            titles: Self::count_prefix(&self.primary, "titles:"),
            users: Self::count_prefix(&self.users, "users:"),
            progress_rows: Self::count_prefix(&self.progress, "progress:"),
            completions: Self::count_prefix(&self.progress, "completed:"),
            ledger_entries: Self::count_prefix(&self.ledger, "ledger:"),
            logged_errors: Self::count_prefix(&self.logs, "logs:"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub missions: usize,
    pub requirements: usize,
    pub rewards: usize,
    pub titles: usize,
    pub users: usize,
    pub progress_rows: usize,
    pub completions: usize,
    pub ledger_entries: usize,
    pub logged_errors: usize,
}

impl ActivityStats for MissionStore {
    fn owned_item_count(&self, username: &str) -> Result<u32, MissionError> {
        let prefix = format!("items:{}:", user_part(username));
        let mut distinct = 0u32;
        for entry in self.activity.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry?;
            let quantity: u32 = Self::deserialize(value)?;
            if quantity > 0 {
                distinct += 1;
            }
        }
        Ok(distinct)
    }

    fn friend_count(&self, username: &str) -> Result<u32, MissionError> {
        let prefix = format!("friends:{}:", user_part(username));
        Ok(Self::count_prefix(&self.activity, &prefix) as u32)
    }

    fn interaction_count(&self, username: &str, interaction: &str) -> Result<u32, MissionError> {
        self.read_counter(&format!(
            "interactions:{}:{}",
            user_part(username),
            interaction
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, MissionStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = MissionStoreBuilder::new(dir.path()).open().expect("store");
        (dir, store)
    }

    #[test]
    fn store_round_trip_user() {
        let (_dir, store) = open_store();
        let mut user = UserRecord::new("Alice", "Alice");
        user.balance = 42;
        store.put_user(user.clone()).expect("put");
        let fetched = store.get_user("alice").expect("get");
        assert_eq!(fetched.username, "Alice");
        assert_eq!(fetched.balance, 42);
        assert_eq!(fetched.schema_version, USER_SCHEMA_VERSION);
        assert_eq!(store.list_usernames().unwrap(), vec!["alice".to_string()]);
    }

    #[test]
    fn upsert_progress_keeps_one_row_per_pair() {
        let (_dir, store) = open_store();
        for progress in [3, 7] {
            store
                .upsert_progress(UserMissionProgress {
                    username: "bob".into(),
                    requirement_id: "req1".into(),
                    mission_id: "m1".into(),
                    progress,
                    completed: false,
                    updated_at: Utc::now(),
                    schema_version: 0,
                })
                .unwrap();
        }
        let rows = store.list_progress("bob").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].progress, 7);
        assert_eq!(rows[0].schema_version, PROGRESS_SCHEMA_VERSION);
    }

    #[test]
    fn rejects_ids_containing_separator() {
        let (_dir, store) = open_store();
        let err = store
            .put_mission(MissionRecord::new("bad:id", "Bad", ""))
            .unwrap_err();
        assert!(matches!(err, MissionError::InvalidIdentifier(_)));
    }

    #[test]
    fn delete_mission_cascades() {
        let (_dir, store) = open_store();
        store.put_mission(MissionRecord::new("m1", "One", "")).unwrap();
        store.put_mission(MissionRecord::new("m10", "Ten", "")).unwrap();
        store
            .put_requirement(MissionRequirement::new("r1", "m1", "friends", 1))
            .unwrap();
        store
            .put_requirement(MissionRequirement::new("r10", "m10", "friends", 1))
            .unwrap();
        store.put_reward(RewardRecord::experience("x1", "m1", 10)).unwrap();
        store.assign_mission("carol", "m1").unwrap();
        for (req, mission) in [("r1", "m1"), ("r10", "m10")] {
            store
                .upsert_progress(UserMissionProgress {
                    username: "carol".into(),
                    requirement_id: req.into(),
                    mission_id: mission.into(),
                    progress: 1,
                    completed: true,
                    updated_at: Utc::now(),
                    schema_version: 0,
                })
                .unwrap();
        }
        let mut done = UserMission::new("carol", "m1");
        done.mark_completed();
        store.upsert_user_mission(done).unwrap();

        store.delete_mission("m1").unwrap();

        assert!(matches!(store.get_mission("m1"), Err(MissionError::NotFound(_))));
        assert!(store.list_requirements("m1").unwrap().is_empty());
        assert!(store.list_rewards("m1").unwrap().is_empty());
        assert!(!store.is_assigned("carol", "m1").unwrap());
        assert!(!store.user_mission_completed("carol", "m1").unwrap());
        let remaining = store.list_progress("carol").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].requirement_id, "r10");
        assert_eq!(store.list_requirements("m10").unwrap().len(), 1);
    }

    #[test]
    fn requirement_ids_are_scoped_to_their_mission() {
        let (_dir, store) = open_store();
        for (mission, progress) in [("m1", 2), ("m2", 9)] {
            store.put_mission(MissionRecord::new(mission, mission, "")).unwrap();
            store
                .put_requirement(MissionRequirement::new("r1", mission, "friends", 5))
                .unwrap();
            store
                .upsert_progress(UserMissionProgress {
                    username: "dora".into(),
                    requirement_id: "r1".into(),
                    mission_id: mission.into(),
                    progress,
                    completed: progress >= 5,
                    updated_at: Utc::now(),
                    schema_version: 0,
                })
                .unwrap();
        }
        assert_eq!(store.list_progress("dora").unwrap().len(), 2);
        assert_eq!(store.find_progress("dora", "m1", "r1").unwrap().unwrap().progress, 2);
        assert_eq!(store.find_progress("dora", "m2", "r1").unwrap().unwrap().progress, 9);

        store.delete_mission("m1").unwrap();
        assert!(store.find_progress("dora", "m1", "r1").unwrap().is_none());
        let left = store.list_mission_progress("dora", "m2").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].progress, 9);
    }

    #[test]
    fn credit_user_writes_balance_and_ledger_together() {
        let (_dir, store) = open_store();
        let entry = store.credit_user("erin", 40, "Bounty").unwrap();
        assert_eq!(entry.balance_after, 40);
        assert_eq!(store.get_user("erin").unwrap().balance, 40);
        assert_eq!(store.list_ledger("erin").unwrap(), vec![entry]);

        let mut erin = store.get_user("erin").unwrap();
        erin.balance = i64::MAX - 1;
        store.put_user(erin).unwrap();
        let err = store.credit_user("erin", 5, "Overflow").unwrap_err();
        assert!(matches!(err, MissionError::InvalidCurrency(_)));
        assert_eq!(store.get_user("erin").unwrap().balance, i64::MAX - 1);
        assert_eq!(store.list_ledger("erin").unwrap().len(), 1);
    }

    #[test]
    fn credit_user_aborts_on_unreadable_record() {
        let (_dir, store) = open_store();
        store
            .users
            .insert(MissionStore::user_key("frank"), b"not a user".to_vec())
            .unwrap();
        assert!(store.credit_user("frank", 10, "Bounty").is_err());
        assert!(store.list_ledger("frank").unwrap().is_empty());
    }

    #[test]
    fn activity_counters() {
        let (_dir, store) = open_store();
        store.add_owned_item("dave", "sword", 1).unwrap();
        store.add_owned_item("dave", "sword", 2).unwrap();
        store.add_owned_item("dave", "shield", 1).unwrap();
        assert_eq!(store.owned_item_count("dave").unwrap(), 2);

        assert!(store.add_friend("dave", "erin").unwrap());
        assert!(!store.add_friend("dave", "ERIN").unwrap());
        assert_eq!(store.friend_count("dave").unwrap(), 1);

        store.record_interaction("dave", "likes_given", 4).unwrap();
        assert_eq!(store.interaction_count("dave", "likes_given").unwrap(), 4);
        assert_eq!(store.interaction_count("dave", "posts_published").unwrap(), 0);
    }

    #[test]
    fn seeding_only_happens_once() {
        let dir = TempDir::new().expect("tempdir");
        {
            let store = MissionStoreBuilder::new(dir.path())
                .with_starter_content()
                .open()
                .expect("store");
            assert!(!store.list_missions().unwrap().is_empty());
            assert!(!store.list_titles().unwrap().is_empty());
            assert!(store.get_level_table().unwrap().is_some());
        }
        let store = MissionStoreBuilder::new(dir.path()).open().expect("reopen");
        assert_eq!(store.seed_starter_content_if_needed().unwrap(), 0);
    }

    #[test]
    fn update_user_serialises_concurrent_writers() {
        let (_dir, store) = open_store();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store
                            .update_user("racer", |user| {
                                user.balance += 1;
                                Ok(())
                            })
                            .expect("update");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
        assert_eq!(store.get_user("racer").unwrap().balance, 100);
    }

    #[test]
    fn update_user_error_leaves_record_untouched() {
        let (_dir, store) = open_store();
        store.ensure_user("alice").unwrap();
        let err = store
            .update_user("alice", |user| {
                user.balance = 99;
                Err(MissionError::Internal("nope".into()))
            })
            .unwrap_err();
        assert!(matches!(err, MissionError::Internal(_)));
        assert_eq!(store.get_user("alice").unwrap().balance, 0);
    }
}
