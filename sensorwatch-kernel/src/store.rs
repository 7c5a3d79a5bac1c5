/**
 * TIME SERIES STORE - Stockage borné en mémoire des lectures par hôte
 *
 * RÔLE : Garde pour chaque hôte un historique circulaire (capacité max_history)
 * dont le dernier élément est la lecture "courante". Sert des snapshots cohérents.
 *
 * CONCURRENCE : une RwLock sur la table des hôtes (écriture uniquement à l'arrivée
 * d'un nouvel hôte) + un Mutex par hôte. Deux hôtes différents ne se bloquent jamais
 * pendant une mutation ; evict + push d'un même hôte sont atomiques.
 *
 * PAS DE PERSISTANCE : un redémarrage perd tout l'état.
 */

use crate::models::Reading;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_MAX_HISTORY: usize = 100;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Historique d'un hôte, du plus ancien au plus récent
#[derive(Debug)]
struct HostSeries {
    readings: VecDeque<Reading>,
}

impl HostSeries {
    fn with_capacity(capacity: usize) -> Self {
        Self { readings: VecDeque::with_capacity(capacity) }
    }

    /// evict + push, la longueur ne dépasse jamais `capacity`
    fn push(&mut self, reading: Reading, capacity: usize) {
        while self.readings.len() >= capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    fn current(&self) -> Option<&Reading> {
        self.readings.back()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreStats {
    pub hosts: usize,
    pub readings_retained: usize,
    pub ingested: u64,
    pub rejected: u64,
}

#[derive(Debug)]
pub struct TimeSeriesStore {
    hosts: RwLock<HashMap<String, Shared<HostSeries>>>,
    max_history: usize,
    ingested: AtomicU64,
    rejected: AtomicU64,
}

pub type SharedStore = Arc<TimeSeriesStore>;

impl TimeSeriesStore {
    /// `max_history` est ramené à 1 au minimum (la config le valide déjà)
    pub fn new(max_history: usize) -> Self {
        Self {
            hosts: RwLock::new(HashMap::new()),
            max_history: max_history.max(1),
            ingested: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Ajoute une lecture. Hostname vide → no-op silencieux (compté), retourne false.
    pub fn add_reading(&self, reading: Reading) -> bool {
        if reading.hostname.is_empty() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!("[store] reading without hostname ignored");
            return false;
        }

        // chemin rapide : hôte déjà connu, seul son mutex est pris en écriture
        {
            let hosts = self.hosts.read();
            if let Some(series) = hosts.get(&reading.hostname) {
                series.lock().push(reading, self.max_history);
                self.ingested.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        }

        // nouvel hôte : la série est insérée déjà remplie, jamais vide pour un lecteur
        let hostname = reading.hostname.clone();
        let mut hosts = self.hosts.write();
        let series = hosts
            .entry(hostname)
            .or_insert_with(|| new_state(HostSeries::with_capacity(self.max_history)));
        series.lock().push(reading, self.max_history);
        self.ingested.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Snapshot hostname → dernière lecture
    pub fn get_current_data(&self) -> BTreeMap<String, Reading> {
        let hosts = self.hosts.read();
        hosts
            .iter()
            .filter_map(|(hostname, series)| {
                series.lock().current().cloned().map(|r| (hostname.clone(), r))
            })
            .collect()
    }

    /// Les `limit` lectures les plus récentes, la plus ancienne en premier.
    /// Hôte inconnu → vecteur vide.
    pub fn get_history(&self, hostname: &str, limit: usize) -> Vec<Reading> {
        let hosts = self.hosts.read();
        let Some(series) = hosts.get(hostname) else { return Vec::new(); };
        let series = series.lock();
        let skip = series.readings.len().saturating_sub(limit);
        series.readings.iter().skip(skip).cloned().collect()
    }

    pub fn get_all_hostnames(&self) -> BTreeSet<String> {
        let hosts = self.hosts.read();
        hosts
            .iter()
            .filter(|(_, series)| series.lock().current().is_some())
            .map(|(hostname, _)| hostname.clone())
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let hosts = self.hosts.read();
        let readings_retained = hosts.values().map(|s| s.lock().readings.len()).sum();
        StoreStats {
            hosts: hosts.len(),
            readings_retained,
            ingested: self.ingested.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}
