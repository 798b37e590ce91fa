//! Chat log, speech bubbles and the message composer

use crate::roster::PlayerKey;
use log::debug;
use shared::Position;
use std::collections::{BTreeMap, VecDeque};

/// How long a bubble stays on screen
pub const BUBBLE_LIFETIME_MS: u64 = 5000;
/// Final stretch of the lifetime during which a bubble fades out
pub const BUBBLE_FADE_MS: u64 = 1000;
pub const CHAT_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatBubble {
    pub message: String,
    pub username: String,
    /// Sender position when the message arrived
    pub position: Position,
    pub timestamp: u64,
}

impl ChatBubble {
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.age(now) > BUBBLE_LIFETIME_MS
    }

    /// Opacity in `[0, 1]`, falling linearly to zero over the last second
    pub fn alpha(&self, now: u64) -> f32 {
        let remaining = BUBBLE_LIFETIME_MS.saturating_sub(self.age(now));
        if remaining >= BUBBLE_FADE_MS {
            1.0
        } else {
            remaining as f32 / BUBBLE_FADE_MS as f32
        }
    }
}

/// At most one live bubble per sender; a new message replaces the old one
#[derive(Debug, Default)]
pub struct ChatBubbles {
    bubbles: BTreeMap<PlayerKey, ChatBubble>,
}

impl ChatBubbles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: PlayerKey, bubble: ChatBubble) {
        self.bubbles.insert(key, bubble);
    }

    pub fn get(&self, key: &PlayerKey) -> Option<&ChatBubble> {
        self.bubbles.get(key)
    }

    pub fn remove(&mut self, key: &PlayerKey) -> Option<ChatBubble> {
        self.bubbles.remove(key)
    }

    /// Drops every expired bubble and returns how many were removed
    pub fn sweep(&mut self, now: u64) -> usize {
        let before = self.bubbles.len();
        self.bubbles.retain(|_, bubble| !bubble.is_expired(now));
        before - self.bubbles.len()
    }

    /// Keeps only the bubbles for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&PlayerKey) -> bool) {
        self.bubbles.retain(|key, _| keep(key));
    }

    /// Scheduled removal: only removes the bubble if it is still the one the
    /// timer was armed for, so a newer message keeps its full lifetime
    pub fn expire_if_matches(&mut self, key: &PlayerKey, timestamp: u64) -> bool {
        match self.bubbles.get(key) {
            Some(bubble) if bubble.timestamp == timestamp => {
                self.bubbles.remove(key);
                debug!("Bubble {:?} removed by timer", key);
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerKey, &ChatBubble)> {
        self.bubbles.iter()
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub username: String,
    pub message: String,
    /// Sent by the local player
    pub own: bool,
}

impl ChatLine {
    pub fn text(&self) -> String {
        format!("{}: {}", self.username, self.message)
    }
}

/// Scrollback of received chat, oldest first
#[derive(Debug)]
pub struct ChatLog {
    lines: VecDeque<ChatLine>,
    capacity: usize,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::with_capacity(CHAT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: ChatLine) {
        self.lines.push_back(line);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ChatLine> {
        self.lines.iter()
    }

    /// The newest `count` lines, oldest first
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ChatLine> {
        self.lines.iter().skip(self.lines.len().saturating_sub(count))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-line text entry for outgoing chat
#[derive(Debug, Default)]
pub struct Composer {
    open: bool,
    buffer: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn open(&mut self) {
        self.open = true;
        self.buffer.clear();
    }

    pub fn cancel(&mut self) {
        self.open = false;
        self.buffer.clear();
    }

    /// Appends a typed character; control characters are ignored
    pub fn push_char(&mut self, c: char) {
        if self.open && !c.is_control() {
            self.buffer.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.open {
            self.buffer.pop();
        }
    }

    /// Closes the composer and returns the trimmed message, if any
    pub fn submit(&mut self) -> Option<String> {
        if !self.open {
            return None;
        }
        let message = self.buffer.trim().to_string();
        self.cancel();
        if message.is_empty() {
            None
        } else {
            Some(message)
        }
    }
}
