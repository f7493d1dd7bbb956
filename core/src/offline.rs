//! Offline asset caching policy for the installable web build.
//!
//! The browser side supplies the actual cache and network through the
//! [`CacheStorage`] and [`Network`] traits; this module decides what goes
//! where:
//!
//! - **install**: fetch every manifest asset into the versioned cache,
//!   all-or-nothing.
//! - **activate**: drop caches left behind by other versions.
//! - **fetch**: same-origin requests are served cache-first, falling back
//!   to the network; cross-origin requests go to the network first and fall
//!   back to the cached shell document.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::CacheError;

/// Name of the cache for the current build.
pub const CACHE_VERSION: &str = "pwa-2048-v4";

/// Same-origin paths cached on install.
pub const ASSET_MANIFEST: [&str; 8] = [
    "./",
    "./index.html",
    "./style.css",
    "./script.js",
    "./manifest.webmanifest",
    "./icon-192.png",
    "./icon-512.png",
    "./apple-touch-icon.png",
];

/// Page served when a cross-origin request fails.
pub const SHELL_DOCUMENT: &str = "./index.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub origin: String,
    pub path: String,
}

impl AssetRequest {
    pub fn new(origin: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            path: path.into(),
        }
    }
}

pub trait Network {
    fn fetch(&mut self, request: &AssetRequest) -> Result<Asset, CacheError>;
}

/// Named caches of path → asset, like the browser `CacheStorage`.
pub trait CacheStorage {
    fn cache_names(&self) -> Vec<String>;
    fn put(&mut self, cache: &str, path: &str, asset: Asset) -> Result<(), CacheError>;
    /// Look `path` up in every cache, oldest name first.
    fn lookup(&self, path: &str) -> Option<Asset>;
    /// Returns whether a cache by that name existed.
    fn delete(&mut self, cache: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStorage {
    caches: BTreeMap<String, BTreeMap<String, Asset>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self, cache: &str) -> usize {
        self.caches.get(cache).map_or(0, BTreeMap::len)
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn cache_names(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    fn put(&mut self, cache: &str, path: &str, asset: Asset) -> Result<(), CacheError> {
        self.caches
            .entry(cache.to_owned())
            .or_default()
            .insert(path.to_owned(), asset);
        Ok(())
    }

    fn lookup(&self, path: &str) -> Option<Asset> {
        self.caches
            .values()
            .find_map(|entries| entries.get(path).cloned())
    }

    fn delete(&mut self, cache: &str) -> bool {
        self.caches.remove(cache).is_some()
    }
}

/// Cache policy bound to one origin and one cache version.
#[derive(Debug, Clone)]
pub struct OfflineCache {
    origin: String,
    version: String,
    manifest: Vec<String>,
}

impl OfflineCache {
    /// Policy for `origin` with the built-in version and manifest.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            version: CACHE_VERSION.to_owned(),
            manifest: ASSET_MANIFEST.iter().map(|p| (*p).to_owned()).collect(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    /// Populate the versioned cache. If any asset fails to download the
    /// cache is left untouched and the first failure is returned.
    pub fn install<C: CacheStorage, N: Network>(
        &self,
        storage: &mut C,
        network: &mut N,
    ) -> Result<(), CacheError> {
        let fetched = self
            .manifest
            .iter()
            .map(|path| {
                let asset = network.fetch(&AssetRequest::new(self.origin.as_str(), path.as_str()))?;
                Ok((path, asset))
            })
            .collect::<Result<Vec<_>, CacheError>>()?;

        for (path, asset) in fetched {
            storage.put(&self.version, path, asset)?;
        }
        info!(version = %self.version, assets = self.manifest.len(), "asset cache installed");
        Ok(())
    }

    /// Delete every cache other than the current version. Returns the
    /// names that were removed.
    pub fn activate<C: CacheStorage>(&self, storage: &mut C) -> Vec<String> {
        let stale: Vec<String> = storage
            .cache_names()
            .into_iter()
            .filter(|name| *name != self.version)
            .collect();
        for name in &stale {
            storage.delete(name);
            debug!(cache = %name, "deleted stale asset cache");
        }
        stale
    }

    /// Answer a request according to the origin policy.
    pub fn fetch<C: CacheStorage, N: Network>(
        &self,
        storage: &C,
        network: &mut N,
        request: &AssetRequest,
    ) -> Result<Asset, CacheError> {
        if request.origin == self.origin {
            if let Some(hit) = storage.lookup(&request.path) {
                return Ok(hit);
            }
            return network.fetch(request);
        }

        match network.fetch(request) {
            Ok(asset) => Ok(asset),
            Err(err) => {
                debug!(%err, path = %request.path, "cross-origin fetch failed, serving shell");
                storage.lookup(SHELL_DOCUMENT).ok_or(err)
            }
        }
    }

    /// Delete every cache regardless of version. Returns how many existed.
    pub fn purge_all<C: CacheStorage>(storage: &mut C) -> usize {
        storage
            .cache_names()
            .iter()
            .filter(|name| storage.delete(name))
            .count()
    }
}
