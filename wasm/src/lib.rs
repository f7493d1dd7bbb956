//! # p2048 WebAssembly Bindings
//!
//! JavaScript-facing wrapper around the game session for the installable web
//! build. The page forwards keys, swipes and button presses; every call hands
//! back a render snapshot object:
//!
//! ```text
//! { size, rows: number[][], score, best, canUndo,
//!   terminal?: { title, description } }
//! ```
//!
//! State lives in `window.localStorage` under the same keys older builds of
//! the page used, so existing saves keep working.

use p2048_core::offline::{ASSET_MANIFEST, CACHE_VERSION};
use p2048_core::{
    swipe_direction, Direction, GridSize, KeyValueStore, Notifier, NotifyError, Preferences,
    SeededRandom, Session, SessionEvent, StoreError, Theme,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use web_sys::{AudioContext, OscillatorType, Storage};

// =============================================================================
// localStorage
// =============================================================================

/// `window.localStorage` as a [`KeyValueStore`].
///
/// Storage is looked up on every call; private browsing modes may refuse it,
/// which surfaces as [`StoreError::Unavailable`] and is logged by the session.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl LocalStorage {
    fn storage() -> Result<Storage, StoreError> {
        web_sys::window()
            .ok_or_else(|| StoreError::Unavailable("no window".into()))?
            .local_storage()
            .map_err(|err| StoreError::Unavailable(format!("{err:?}")))?
            .ok_or_else(|| StoreError::Unavailable("localStorage disabled".into()))
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Self::storage()?
            .get_item(key)
            .map_err(|err| StoreError::Unavailable(format!("{err:?}")))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|err| StoreError::WriteRejected {
                key: key.to_owned(),
                reason: format!("{err:?}"),
            })
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        Self::storage()?
            .clear()
            .map_err(|err| StoreError::Unavailable(format!("{err:?}")))
    }
}

// =============================================================================
// Audio cues
// =============================================================================

/// Short sine beeps through WebAudio. The context is created lazily on the
/// first cue, since browsers only allow it after a user gesture.
#[derive(Default)]
pub struct WebAudio {
    enabled: bool,
    ctx: Option<AudioContext>,
}

impl WebAudio {
    fn new(enabled: bool) -> Self {
        Self { enabled, ctx: None }
    }

    fn beep(&mut self, freq: f32, secs: f64) -> Result<(), JsValue> {
        let ctx = match &self.ctx {
            Some(ctx) => ctx.clone(),
            None => {
                let ctx = AudioContext::new()?;
                self.ctx = Some(ctx.clone());
                ctx
            }
        };

        let osc = ctx.create_oscillator()?;
        let gain = ctx.create_gain()?;
        osc.set_type(OscillatorType::Sine);
        osc.frequency().set_value(freq);
        osc.connect_with_audio_node(&gain)?;
        gain.connect_with_audio_node(&ctx.destination())?;

        let now = ctx.current_time();
        gain.gain().set_value_at_time(0.06, now)?;
        gain.gain().exponential_ramp_to_value_at_time(0.0001, now + secs)?;
        osc.start()?;
        osc.stop_with_when(now + secs)?;
        Ok(())
    }
}

impl Notifier for WebAudio {
    fn notify(&mut self, event: &SessionEvent) -> Result<(), NotifyError> {
        if !self.enabled {
            return Ok(());
        }
        let played = match event {
            SessionEvent::Merged { .. } => self.beep(660.0, 0.05),
            SessionEvent::Moved { .. } => self.beep(240.0, 0.03),
            SessionEvent::GameOver { .. } => Ok(()),
        };
        played.map_err(|err| NotifyError(format!("{err:?}")))
    }
}

// =============================================================================
// Game
// =============================================================================

/// WebAssembly wrapper for a p2048 session.
#[wasm_bindgen]
pub struct WebGame {
    session: Session<LocalStorage, SeededRandom, WebAudio>,
}

#[wasm_bindgen]
impl WebGame {
    /// Create a game object using the stored preferences. Call `start`
    /// before moving.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> WebGame {
        let session = Session::open(LocalStorage, SeededRandom::new(seed));
        let sound = session.preferences().sound;
        WebGame {
            session: session.with_notifier(WebAudio::new(sound)),
        }
    }

    /// Resume the saved game (`newGame == false`) or start a fresh one.
    pub fn start(&mut self, new_game: bool) -> JsValue {
        self.session.start(new_game);
        self.render()
    }

    /// Move in `direction` ("up", "down", "left", "right"). Unknown
    /// directions leave the game untouched.
    #[wasm_bindgen(js_name = "move")]
    pub fn apply_move(&mut self, direction: &str) -> JsValue {
        match direction.parse::<Direction>() {
            Ok(dir) => self.step(dir),
            Err(_) => self.render(),
        }
    }

    /// Handle a `KeyboardEvent.key` value.
    pub fn key(&mut self, key: &str) -> JsValue {
        match Direction::from_key(key) {
            Some(dir) => self.step(dir),
            None => self.render(),
        }
    }

    /// Handle a finished touch gesture with total displacement `(dx, dy)`.
    pub fn swipe(&mut self, dx: f64, dy: f64) -> JsValue {
        match swipe_direction(dx, dy) {
            Some(dir) => self.step(dir),
            None => self.render(),
        }
    }

    pub fn undo(&mut self) -> JsValue {
        self.session.undo();
        self.render()
    }

    #[wasm_bindgen(js_name = changeSize)]
    pub fn change_size(&mut self, size: usize) -> JsValue {
        self.session.change_size(size);
        self.render()
    }

    /// Save settings from the settings dialog and start a new game.
    #[wasm_bindgen(js_name = applyPreferences)]
    pub fn apply_preferences(&mut self, size: usize, theme: &str, sound: bool) -> JsValue {
        let prefs = Preferences {
            size: GridSize::clamped(size),
            theme: theme.parse().unwrap_or(Theme::Auto),
            sound,
        };
        self.session.apply_preferences(&prefs);
        self.session.notifier_mut().enabled = prefs.sound;
        self.render()
    }

    /// Stored preferences as `{ size, theme, sound }`.
    pub fn preferences(&self) -> JsValue {
        to_js(&self.session.preferences())
    }

    /// Forget everything stored and start over. The page is expected to
    /// clear its caches and unregister the service worker afterwards.
    #[wasm_bindgen(js_name = hardReset)]
    pub fn hard_reset(&mut self) -> JsValue {
        self.session.hard_reset();
        self.session.notifier_mut().enabled = Preferences::default().sound;
        self.render()
    }

    pub fn snapshot(&self) -> JsValue {
        self.render()
    }

    fn step(&mut self, dir: Direction) -> JsValue {
        self.session.apply_move(dir);
        self.render()
    }

    fn render(&self) -> JsValue {
        to_js(&self.session.snapshot())
    }
}

/// Name of the service worker cache for this build.
#[wasm_bindgen(js_name = cacheVersion)]
pub fn cache_version() -> String {
    CACHE_VERSION.to_owned()
}

/// Paths the service worker should cache on install.
#[wasm_bindgen(js_name = assetManifest)]
pub fn asset_manifest() -> JsValue {
    to_js(&ASSET_MANIFEST)
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or_else(|err| {
        tracing::warn!(%err, "could not convert value for JavaScript");
        JsValue::NULL
    })
}
