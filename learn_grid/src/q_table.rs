use crate::config::{LearnerConfig, DISCOUNT_RATE, LEARNING_RATE};
use crate::error::{Error, Result};
use crate::grid::{Action, Position};
use chrono::offset::Local;
use itertools::Itertools;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Tabular action-value estimates. Unseen pairs read as `0.0`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QTable {
    #[serde(serialize_with = "serialize_values")]
    #[serde(deserialize_with = "deserialize_values")]
    values: HashMap<(Position, Action), f64>,
    alpha: f64,
    gamma: f64,
}

impl Deref for QTable {
    type Target = HashMap<(Position, Action), f64>;
    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl Default for QTable {
    fn default() -> Self {
        QTable::new(LEARNING_RATE, DISCOUNT_RATE)
    }
}

impl From<&LearnerConfig> for QTable {
    fn from(config: &LearnerConfig) -> Self {
        QTable::new(config.alpha, config.gamma)
    }
}

impl QTable {
    pub fn new(alpha: f64, gamma: f64) -> Self {
        QTable {
            values: HashMap::new(),
            alpha,
            gamma,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn get(&self, state: Position, action: Action) -> f64 {
        self.values.get(&(state, action)).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, state: Position, action: Action, value: f64) {
        self.values.insert((state, action), value);
    }

    /// Q values of every action in `Action::ALL` order.
    pub fn action_values(&self, state: Position) -> [(Action, f64); 4] {
        Action::ALL.map(|action| (action, self.get(state, action)))
    }

    pub fn max_q(&self, state: Position) -> f64 {
        Action::ALL
            .iter()
            .map(|&action| self.get(state, action))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Greedy action; ties go to the earliest action in `Action::ALL`.
    pub fn best_action(&self, state: Position) -> Action {
        self.action_values(state)
            .into_iter()
            .max_set_by(|(_, value1), (_, value2)| value1.total_cmp(value2))
            .first()
            .map_or(Action::ALL[0], |(action, _)| *action)
    }

    /// Bellman update: `Q(s,a) <- (1 - alpha) Q(s,a) + alpha (r + gamma max_a' Q(s',a'))`.
    pub fn update(
        &mut self,
        state: Position,
        action: Action,
        reward: f64,
        next_state: Position,
    ) -> f64 {
        let best_next = self.max_q(next_state);
        let target = reward + self.gamma * best_next;
        let new_q = (1.0 - self.alpha) * self.get(state, action) + self.alpha * target;
        self.set(state, action, new_q);
        new_q
    }
}

fn key_to_string(&(state, action): &(Position, Action)) -> String {
    format!("{state} {action}")
}

fn key_from_str(key: &str) -> Result<(Position, Action)> {
    let invalid = || Error::InvalidKey {
        key: key.to_owned(),
    };
    let (position, action) = key.rsplit_once(' ').ok_or_else(invalid)?;
    let (x, y) = position
        .trim()
        .strip_prefix('(')
        .and_then(|p| p.strip_suffix(')'))
        .ok_or_else(invalid)?
        .split(',')
        .map(|n| n.trim().parse::<usize>())
        .collect_tuple::<(_, _)>()
        .ok_or_else(invalid)?;
    let position = Position::new(x.map_err(|_| invalid())?, y.map_err(|_| invalid())?);
    let action = action.parse::<Action>().map_err(|_| invalid())?;
    Ok((position, action))
}

fn serialize_values<S>(
    values: &HashMap<(Position, Action), f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(values.len()))?;
    for (k, v) in values.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
        map.serialize_entry(&key_to_string(k), v)?;
    }
    map.end()
}

fn deserialize_values<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<(Position, Action), f64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ValuesVisitor {
        marker: PhantomData<fn() -> HashMap<(Position, Action), f64>>,
    }
    impl<'de> Visitor<'de> for ValuesVisitor {
        type Value = HashMap<(Position, Action), f64>;
        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of \"(x, y) action\" keys to Q values")
        }
        fn visit_map<M>(self, mut access: M) -> std::result::Result<Self::Value, M::Error>
        where
            M: MapAccess<'de>,
        {
            let mut map = HashMap::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, f64>()? {
                let k = key_from_str(&key).map_err(de::Error::custom)?;
                map.insert(k, value);
            }
            Ok(map)
        }
    }
    deserializer.deserialize_map(ValuesVisitor {
        marker: PhantomData,
    })
}

/// Writes `qtable-<date>.pickle` and `qtable-<date>.json` into `dir`.
pub fn q_table_to_disk(dir: &Path, q: &QTable) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir).map_err(|e| Error::io(format!("create {}", dir.display()), e))?;
    let today = Local::now().date_naive();
    let q_pickle = dir.join(format!("qtable-{today}.pickle"));
    let q_json = dir.join(format!("qtable-{today}.json"));

    let file = File::create(&q_pickle)
        .map_err(|e| Error::io(format!("create {}", q_pickle.display()), e))?;
    let mut writer = BufWriter::new(file);
    serde_pickle::to_writer(&mut writer, q, serde_pickle::SerOptions::new())?;
    writer
        .flush()
        .map_err(|e| Error::io(format!("write {}", q_pickle.display()), e))?;

    let file_json =
        File::create(&q_json).map_err(|e| Error::io(format!("create {}", q_json.display()), e))?;
    let mut writer = BufWriter::new(file_json);
    serde_json::to_writer_pretty(&mut writer, q)?;
    writer
        .flush()
        .map_err(|e| Error::io(format!("write {}", q_json.display()), e))?;

    tracing::info!(
        pickle = %q_pickle.display(),
        json = %q_json.display(),
        entries = q.len(),
        "saved Q-table"
    );
    Ok((q_pickle, q_json))
}

pub fn q_table_from_disk_pickle(file: &Path) -> Result<QTable> {
    let reader = File::open(file)
        .map(BufReader::new)
        .map_err(|e| Error::io(format!("open {}", file.display()), e))?;
    let decoded: QTable = serde_pickle::from_reader(reader, serde_pickle::DeOptions::new())?;
    Ok(decoded)
}

pub fn q_table_from_disk_json(file: &Path) -> Result<QTable> {
    let reader = File::open(file)
        .map(BufReader::new)
        .map_err(|e| Error::io(format!("open {}", file.display()), e))?;
    let decoded: QTable = serde_json::from_reader(reader)?;
    Ok(decoded)
}

/// Picks the loader from the file extension (`.json`, otherwise pickle).
pub fn q_table_from_disk(file: &Path) -> Result<QTable> {
    match file.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => q_table_from_disk_json(file),
        _ => q_table_from_disk_pickle(file),
    }
}
