//! Avatar image loading and caching
//!
//! Each player's avatar is fetched at most once. The cache slot is created
//! when the load starts, so a second request for the same key while the first
//! is in flight (or after it finished or failed) does nothing. A failed load
//! is remembered and never retried; the player keeps the colored circle.
//!
//! Images are decoded and clipped to a circle on the network thread; only the
//! GPU upload happens on the render thread.

use log::debug;
use macroquad::texture::Image;
use std::collections::BTreeMap;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum AvatarSlot<T> {
    Loading,
    Ready(T),
    Failed,
}

#[derive(Debug)]
pub struct AvatarCache<K, T> {
    slots: BTreeMap<K, AvatarSlot<T>>,
}

impl<K: Ord + Clone + std::fmt::Debug, T> AvatarCache<K, T> {
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    /// Marks `key` as loading; returns false if it is already known
    pub fn request(&mut self, key: K) -> bool {
        if self.slots.contains_key(&key) {
            return false;
        }
        debug!("Loading avatar for {:?}", key);
        self.slots.insert(key, AvatarSlot::Loading);
        true
    }

    /// Stores a finished image if the slot is still waiting for it
    ///
    /// Returns false when the key was evicted in the meantime, in which case
    /// the value is discarded.
    pub fn complete(&mut self, key: &K, value: T) -> bool {
        match self.slots.get_mut(key) {
            Some(slot @ AvatarSlot::Loading) => {
                *slot = AvatarSlot::Ready(value);
                true
            }
            _ => false,
        }
    }

    pub fn fail(&mut self, key: &K) -> bool {
        match self.slots.get_mut(key) {
            Some(slot @ AvatarSlot::Loading) => {
                *slot = AvatarSlot::Failed;
                true
            }
            _ => false,
        }
    }

    pub fn evict(&mut self, key: &K) -> Option<AvatarSlot<T>> {
        self.slots.remove(key)
    }

    /// Drops every slot whose key fails `keep`, loaded or not
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.slots.retain(|key, _| keep(key));
    }

    /// The image for `key`, if it has finished loading
    pub fn get(&self, key: &K) -> Option<&T> {
        match self.slots.get(key) {
            Some(AvatarSlot::Ready(value)) => Some(value),
            _ => None,
        }
    }

    pub fn slot(&self, key: &K) -> Option<&AvatarSlot<T>> {
        self.slots.get(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K: Ord + Clone + std::fmt::Debug, T> Default for AvatarCache<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives the HTTP origin for assets from the websocket server URL
pub fn asset_base_from_server(server: &str) -> String {
    let base = if let Some(rest) = server.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = server.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        server.to_string()
    };
    base.trim_end_matches('/').to_string()
}

/// Resolves an avatar reference against the asset base
///
/// Absolute http(s) URLs are used as is; anything else is treated as a path
/// on the asset server.
pub fn resolve_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    let base = base.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{}{}", base, url)
    } else {
        format!("{}/{}", base, url)
    }
}

/// Clears the alpha of every RGBA pixel outside the inscribed circle
pub fn mask_to_circle(rgba: &mut [u8], width: usize, height: usize) {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let radius = width.min(height) as f32 / 2.0;

    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy > radius * radius {
                let alpha = (y * width + x) * 4 + 3;
                if let Some(a) = rgba.get_mut(alpha) {
                    *a = 0;
                }
            }
        }
    }
}

/// Decodes PNG/JPEG bytes and clips the result to a circle
pub fn decode_avatar(bytes: &[u8]) -> Result<Image, BoxError> {
    let mut image = Image::from_file_with_format(bytes, None)
        .map_err(|e| format!("undecodable avatar image: {:?}", e))?;
    let (width, height) = (image.width(), image.height());
    mask_to_circle(&mut image.bytes, width, height);
    Ok(image)
}

/// Fetches and decodes one avatar
pub async fn fetch_avatar(http: &reqwest::Client, url: &str) -> Result<Image, BoxError> {
    let response = http.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    decode_avatar(&bytes)
}
