//! Overlay playback for the selected video.
//!
//! ```text
//!           open                Ready + autoplay
//!  Closed ───────▶ Opening ─────────────────────▶ Playing ◀──┐
//!    ▲               │  Ready, no autoplay            │      │ toggle / play
//!    │               │  or autoplay rejected          │      │
//!    │               └───────────────────────▶ Paused ◀──────┘ toggle / pause
//!    │                                           │
//!    └─────────────── close (from any phase) ────┘
//! ```
//!
//! A controller owns at most one [`PlaybackSession`]. Opening a new session
//! closes the current one first, so two elements never play at once. The
//! session's loader starts as soon as the session opens: the overlay is on
//! screen by construction, so there is no visibility wait. Its preload
//! policy comes from [`overlay_preload`] rather than the tier alone.
//!
//! Closing always pauses, rewinds to zero, and releases the element's
//! sources, whatever phase the session was in.

use crate::config::{LoaderConfig, PlaybackConfig};
use crate::loader::{Attempt, LoadOptions, LoadState, LoaderError, MediaEvent, MediaLoader};
use crate::platform::{ElementId, MediaElement};
use crate::poster::Poster;
use crate::sources::overlay_preload;
use crate::types::{MediaAsset, MediaKind, QualityTier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("asset {id} is not a video and cannot be played")]
    NotPlayable { id: u32 },
    #[error(transparent)]
    Loader(#[from] LoaderError),
}

/// What to do with a playing element that leaves the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HiddenPolicy {
    /// Keep playing.
    #[default]
    Continue,
    /// Pause and stay paused.
    Pause,
    /// Pause, and resume when the element comes back into view.
    PauseAndResume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Closed,
    Opening,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackPhase::Closed => "closed",
            PlaybackPhase::Opening => "opening",
            PlaybackPhase::Playing => "playing",
            PlaybackPhase::Paused => "paused",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    pub autoplay: bool,
    pub muted: bool,
    pub looping: bool,
    pub hidden_policy: HiddenPolicy,
    pub loader: LoaderConfig,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self::from_config(&PlaybackConfig::default(), &LoaderConfig::default())
    }
}

impl PlaybackOptions {
    pub fn from_config(playback: &PlaybackConfig, loader: &LoaderConfig) -> Self {
        Self {
            autoplay: playback.autoplay,
            muted: playback.muted,
            looping: playback.looping,
            hidden_policy: playback.hidden_policy,
            loader: loader.clone(),
        }
    }
}

/// The one open overlay.
#[derive(Debug)]
pub struct PlaybackSession {
    id: SessionId,
    asset: MediaAsset,
    element: ElementId,
    phase: PlaybackPhase,
    current_time: f64,
    poster: Option<Poster>,
    /// Paused by [`HiddenPolicy::PauseAndResume`], not by the viewer.
    hidden_pause: bool,
    loader: MediaLoader,
}

impl PlaybackSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn asset(&self) -> &MediaAsset {
        &self.asset
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn poster(&self) -> Option<&Poster> {
        self.poster.as_ref()
    }

    pub fn load_state(&self) -> LoadState {
        self.loader.state()
    }

    /// The load attempt awaiting a host outcome, if any.
    pub fn active_attempt(&self) -> Option<Attempt> {
        self.loader.active_attempt()
    }
}

#[derive(Debug)]
pub struct PlaybackController {
    options: PlaybackOptions,
    next_session: u64,
    session: Option<PlaybackSession>,
    phase: watch::Sender<PlaybackPhase>,
}

impl PlaybackController {
    pub fn new(options: PlaybackOptions) -> Self {
        let (phase, _) = watch::channel(PlaybackPhase::Closed);
        Self {
            options,
            next_session: 0,
            session: None,
            phase,
        }
    }

    pub fn options(&self) -> &PlaybackOptions {
        &self.options
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.session
            .as_ref()
            .map_or(PlaybackPhase::Closed, |s| s.phase)
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackPhase> {
        self.phase.subscribe()
    }

    /// Open `asset` on `element`, closing any current session first.
    pub fn open(
        &mut self,
        asset: &MediaAsset,
        element: ElementId,
        tier: QualityTier,
        media: &impl MediaElement,
    ) -> Result<SessionId, PlaybackError> {
        if !asset.is_playable() {
            return Err(PlaybackError::NotPlayable { id: asset.id });
        }
        let preload = overlay_preload(tier, self.options.loader.preload, self.options.autoplay);
        let mut loader = MediaLoader::new(
            element,
            asset.url.as_str(),
            LoadOptions::new(MediaKind::Video, tier, &self.options.loader).with_preload(preload),
        )?;
        self.close(media);

        self.next_session += 1;
        let id = SessionId(self.next_session);
        media.set_muted(element, self.options.muted);
        media.set_loop(element, self.options.looping);
        loader.on_visibility(true, media);

        info!(session = id.0, asset = asset.id, title = %asset.title, %tier, "playback opened");
        self.session = Some(PlaybackSession {
            id,
            asset: asset.clone(),
            element,
            phase: PlaybackPhase::Opening,
            current_time: 0.0,
            poster: None,
            hidden_pause: false,
            loader,
        });
        self.publish();
        Ok(id)
    }

    /// Attach a derived poster. Ignored unless `id` is the open session.
    pub fn set_poster(&mut self, id: SessionId, poster: Poster) -> bool {
        match self.session.as_mut() {
            Some(session) if session.id == id => {
                session.poster = Some(poster);
                true
            }
            _ => {
                debug!(session = id.0, "dropping poster for closed session");
                false
            }
        }
    }

    /// Route a media event for the session's element. Returns the phase after
    /// the event, or `None` if the event did not belong to the session.
    pub fn handle(
        &mut self,
        event: &MediaEvent,
        media: &impl MediaElement,
    ) -> Option<PlaybackPhase> {
        let session = self.session.as_mut()?;
        if session.element != event.element {
            return None;
        }
        let state = session.loader.handle(event)?;
        if state.is_ready() && session.phase == PlaybackPhase::Opening {
            if self.options.autoplay {
                Self::start(session, media);
            } else {
                session.phase = PlaybackPhase::Paused;
            }
            self.publish();
        }
        Some(self.phase())
    }

    /// Tap/click on the video. Ignored while opening.
    pub fn toggle(&mut self, media: &impl MediaElement) -> Option<PlaybackPhase> {
        match self.phase() {
            PlaybackPhase::Playing => self.pause(media),
            PlaybackPhase::Paused => self.play(media),
            PlaybackPhase::Opening | PlaybackPhase::Closed => None,
        }
    }

    /// Resume a paused session. Returns the new phase if it changed.
    pub fn play(&mut self, media: &impl MediaElement) -> Option<PlaybackPhase> {
        let session = self.session.as_mut()?;
        if session.phase != PlaybackPhase::Paused {
            return None;
        }
        session.hidden_pause = false;
        Self::start(session, media);
        let phase = session.phase;
        self.publish();
        (phase == PlaybackPhase::Playing).then_some(phase)
    }

    /// Pause a playing session. Returns the new phase if it changed.
    pub fn pause(&mut self, media: &impl MediaElement) -> Option<PlaybackPhase> {
        let session = self.session.as_mut()?;
        if session.phase != PlaybackPhase::Playing {
            return None;
        }
        media.pause(session.element);
        session.hidden_pause = false;
        session.phase = PlaybackPhase::Paused;
        self.publish();
        Some(PlaybackPhase::Paused)
    }

    /// Tear down the session from any phase. Returns the closed session's id.
    pub fn close(&mut self, media: &impl MediaElement) -> Option<SessionId> {
        let mut session = self.session.take()?;
        media.pause(session.element);
        media.seek(session.element, 0.0);
        session.loader.unmount(media);
        info!(session = session.id.0, asset = session.asset.id, from = %session.phase, "playback closed");
        self.publish();
        Some(session.id)
    }

    /// Track the element's playback position, in seconds.
    pub fn on_time_update(&mut self, position: f64) {
        if let Some(session) = self.session.as_mut()
            && position.is_finite()
            && position >= 0.0
        {
            session.current_time = position;
        }
    }

    /// Apply the configured [`HiddenPolicy`] to a visibility change of the
    /// session's element.
    pub fn on_visibility(
        &mut self,
        visible: bool,
        media: &impl MediaElement,
    ) -> Option<PlaybackPhase> {
        let policy = self.options.hidden_policy;
        let session = self.session.as_mut()?;
        match (policy, visible, session.phase) {
            (HiddenPolicy::Continue, _, _) => None,
            (_, false, PlaybackPhase::Playing) => {
                media.pause(session.element);
                session.phase = PlaybackPhase::Paused;
                session.hidden_pause = policy == HiddenPolicy::PauseAndResume;
                debug!(session = session.id.0, "paused while hidden");
                self.publish();
                Some(PlaybackPhase::Paused)
            }
            (HiddenPolicy::PauseAndResume, true, PlaybackPhase::Paused) if session.hidden_pause => {
                session.hidden_pause = false;
                Self::start(session, media);
                let phase = session.phase;
                self.publish();
                Some(phase)
            }
            _ => None,
        }
    }

    /// Retry a failed load for the open session.
    pub fn retry(&mut self, media: &impl MediaElement) -> Option<Attempt> {
        self.session.as_mut()?.loader.retry(media)
    }

    /// Fail the session's load if it has stalled past the configured timeout.
    pub fn check_timeout(&mut self, now: Instant, media: &impl MediaElement) -> Option<LoadState> {
        self.session.as_mut()?.loader.check_timeout(now, media)
    }

    fn start(session: &mut PlaybackSession, media: &impl MediaElement) {
        match media.play(session.element) {
            Ok(()) => session.phase = PlaybackPhase::Playing,
            Err(e) => {
                warn!(session = session.id.0, error = %e, "play rejected, staying paused");
                session.phase = PlaybackPhase::Paused;
            }
        }
    }

    fn publish(&self) {
        let phase = self.phase();
        self.phase.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                *current = phase;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PreloadPolicy;
    use crate::platform::backend::tests::{MockPlatform, RecordedOp};
    use std::sync::atomic::Ordering;

    const OVERLAY: ElementId = ElementId(500);

    fn video(id: u32, url: &str) -> MediaAsset {
        MediaAsset {
            id,
            title: format!("Project {id}"),
            category: "residential".into(),
            url: url.into(),
            kind: MediaKind::Video,
            thumbnail: None,
        }
    }

    fn image(id: u32) -> MediaAsset {
        MediaAsset {
            kind: MediaKind::Image,
            url: "/photos/a.jpg".into(),
            ..video(id, "")
        }
    }

    fn controller() -> PlaybackController {
        PlaybackController::new(PlaybackOptions::default())
    }

    fn controller_with(policy: HiddenPolicy) -> PlaybackController {
        PlaybackController::new(PlaybackOptions {
            hidden_policy: policy,
            ..PlaybackOptions::default()
        })
    }

    fn pending(ctl: &PlaybackController) -> Attempt {
        ctl.session().unwrap().active_attempt().unwrap()
    }

    /// Open and deliver CanPlay for the session's first attempt.
    fn open_ready(ctl: &mut PlaybackController, mock: &MockPlatform, asset: &MediaAsset) -> SessionId {
        let id = ctl.open(asset, OVERLAY, QualityTier::High, mock).unwrap();
        ctl.handle(&MediaEvent::can_play(OVERLAY, pending(ctl)), mock);
        id
    }

    #[test]
    fn hidden_policy_serializes_kebab_case() {
        #[derive(Serialize, Deserialize)]
        struct Wrap {
            policy: HiddenPolicy,
        }
        let text = toml::to_string(&Wrap {
            policy: HiddenPolicy::PauseAndResume,
        })
        .unwrap();
        assert!(text.contains("\"pause-and-resume\""));
    }

    #[test]
    fn images_are_not_playable() {
        let mock = MockPlatform::new();
        let mut ctl = controller();
        assert_eq!(
            ctl.open(&image(7), OVERLAY, QualityTier::High, &mock),
            Err(PlaybackError::NotPlayable { id: 7 })
        );
        assert!(!ctl.is_open());
        assert!(mock.get_operations().is_empty());
    }

    #[test]
    fn open_applies_mute_loop_and_loads_immediately() {
        let mock = MockPlatform::new();
        let mut ctl = controller();
        ctl.open(&video(1, "/videos/GYM.mp4"), OVERLAY, QualityTier::High, &mock)
            .unwrap();

        assert_eq!(ctl.phase(), PlaybackPhase::Opening);
        let ops = mock.get_operations();
        assert_eq!(ops[0], RecordedOp::SetMuted(OVERLAY, true));
        assert_eq!(ops[1], RecordedOp::SetLoop(OVERLAY, false));
        assert_eq!(mock.loads(), vec![OVERLAY]);
    }

    #[test]
    fn low_tier_overlay_still_preloads() {
        let mock = MockPlatform::new();
        let mut ctl = controller();
        ctl.open(&video(1, "/videos/GYM.mp4"), OVERLAY, QualityTier::Low, &mock)
            .unwrap();
        assert_eq!(
            mock.get_operations()[2],
            RecordedOp::SetPreload(OVERLAY, PreloadPolicy::Auto)
        );

        let mut manual = PlaybackController::new(PlaybackOptions {
            autoplay: false,
            ..PlaybackOptions::default()
        });
        mock.clear_operations();
        manual
            .open(&video(2, "/videos/dbre.mp4"), OVERLAY, QualityTier::Low, &mock)
            .unwrap();
        assert_eq!(
            mock.get_operations()[2],
            RecordedOp::SetPreload(OVERLAY, PreloadPolicy::Metadata)
        );
        manual.handle(&MediaEvent::can_play(OVERLAY, pending(&manual)), &mock);
        assert_eq!(manual.phase(), PlaybackPhase::Paused);
    }

    #[test]
    fn ready_with_autoplay_plays() {
        let mock = MockPlatform::new();
        let mut ctl = controller();
        open_ready(&mut ctl, &mock, &video(1, "/videos/GYM.mp4"));
        assert_eq!(ctl.phase(), PlaybackPhase::Playing);
        assert!(mock.get_operations().contains(&RecordedOp::Play(OVERLAY)));
    }

    #[test]
    fn ready_without_autoplay_pauses() {
        let mock = MockPlatform::new();
        let mut ctl = PlaybackController::new(PlaybackOptions {
            autoplay: false,
            ..PlaybackOptions::default()
        });
        open_ready(&mut ctl, &mock, &video(1, "/videos/GYM.mp4"));
        assert_eq!(ctl.phase(), PlaybackPhase::Paused);
        assert!(!mock.get_operations().contains(&RecordedOp::Play(OVERLAY)));
    }

    #[test]
    fn rejected_autoplay_leaves_paused() {
        let mock = MockPlatform::new();
        mock.reject_play.store(true, Ordering::SeqCst);
        let mut ctl = controller();
        open_ready(&mut ctl, &mock, &video(1, "/videos/GYM.mp4"));
        assert_eq!(ctl.phase(), PlaybackPhase::Paused);
    }

    #[test]
    fn load_failure_stays_opening_and_retry_recovers() {
        let mock = MockPlatform::new();
        let mut ctl = controller();
        ctl.open(&video(1, "/videos/GYM.mp4"), OVERLAY, QualityTier::High, &mock)
            .unwrap();

        let phase = ctl.handle(&MediaEvent::error(OVERLAY, pending(&ctl), "404"), &mock);
        assert_eq!(phase, Some(PlaybackPhase::Opening));
        assert!(ctl.session().unwrap().load_state().is_failed());

        let attempt = ctl.retry(&mock).unwrap();
        ctl.handle(&MediaEvent::can_play(OVERLAY, attempt), &mock);
        assert_eq!(ctl.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn toggle_flips_and_ignores_opening() {
        let mock = MockPlatform::new();
        let mut ctl = controller();
        ctl.open(&video(1, "/videos/GYM.mp4"), OVERLAY, QualityTier::High, &mock)
            .unwrap();
        assert_eq!(ctl.toggle(&mock), None);

        ctl.handle(&MediaEvent::can_play(OVERLAY, pending(&ctl)), &mock);
        assert_eq!(ctl.toggle(&mock), Some(PlaybackPhase::Paused));
        assert_eq!(ctl.toggle(&mock), Some(PlaybackPhase::Playing));
        assert_eq!(ctl.pause(&mock), Some(PlaybackPhase::Paused));
        assert_eq!(ctl.pause(&mock), None);
        assert_eq!(ctl.play(&mock), Some(PlaybackPhase::Playing));
        assert_eq!(ctl.play(&mock), None);
    }

    #[test]
    fn close_rewinds_and_releases_from_playing_and_paused() {
        for pause_first in [false, true] {
            let mock = MockPlatform::new();
            let mut ctl = controller();
            open_ready(&mut ctl, &mock, &video(1, "/videos/GYM.mp4"));
            ctl.on_time_update(12.5);
            if pause_first {
                ctl.pause(&mock);
            }
            mock.clear_operations();

            assert_eq!(ctl.close(&mock), Some(SessionId(1)));
            assert_eq!(ctl.phase(), PlaybackPhase::Closed);
            assert_eq!(
                mock.get_operations(),
                vec![
                    RecordedOp::Pause(OVERLAY),
                    RecordedOp::Seek(OVERLAY, 0.0),
                    RecordedOp::ClearSources(OVERLAY),
                ]
            );
        }
    }

    #[test]
    fn close_while_opening_discards_late_ready() {
        let mock = MockPlatform::new();
        let mut ctl = controller();
        ctl.open(&video(1, "/videos/GYM.mp4"), OVERLAY, QualityTier::High, &mock)
            .unwrap();
        let attempt = pending(&ctl);
        ctl.close(&mock);
        assert_eq!(ctl.handle(&MediaEvent::can_play(OVERLAY, attempt), &mock), None);
        assert_eq!(ctl.phase(), PlaybackPhase::Closed);
        assert_eq!(ctl.close(&mock), None);
    }

    #[test]
    fn opening_second_session_closes_first_before_loading() {
        let mock = MockPlatform::new();
        let mut ctl = controller();
        open_ready(&mut ctl, &mock, &video(1, "/videos/GYM.mp4"));
        mock.clear_operations();

        let second = ElementId(501);
        let id = ctl
            .open(&video(2, "/videos/dbre.mp4"), second, QualityTier::High, &mock)
            .unwrap();
        assert_eq!(id, SessionId(2));

        let ops = mock.get_operations();
        let closed_at = ops
            .iter()
            .position(|op| *op == RecordedOp::ClearSources(OVERLAY))
            .unwrap();
        let opened_at = ops
            .iter()
            .position(|op| *op == RecordedOp::SetMuted(second, true))
            .unwrap();
        assert!(closed_at < opened_at);
        assert_eq!(ctl.session().unwrap().asset().id, 2);
        assert_eq!(ctl.phase(), PlaybackPhase::Opening);
    }

    #[test]
    fn poster_for_stale_session_is_ignored() {
        let mock = MockPlatform::new();
        let mut ctl = controller();
        let first = ctl
            .open(&video(1, "/videos/a.mp4"), OVERLAY, QualityTier::High, &mock)
            .unwrap();
        let second = ctl
            .open(&video(2, "/videos/b.mp4"), OVERLAY, QualityTier::High, &mock)
            .unwrap();

        assert!(!ctl.set_poster(first, Poster::Placeholder));
        assert!(ctl.set_poster(second, Poster::Placeholder));
        assert_eq!(ctl.session().unwrap().poster(), Some(&Poster::Placeholder));
    }

    #[test]
    fn time_updates_track_position() {
        let mock = MockPlatform::new();
        let mut ctl = controller();
        open_ready(&mut ctl, &mock, &video(1, "/videos/GYM.mp4"));
        ctl.on_time_update(3.25);
        ctl.on_time_update(f64::NAN);
        assert_eq!(ctl.session().unwrap().current_time(), 3.25);
    }

    #[test]
    fn continue_policy_keeps_playing_when_hidden() {
        let mock = MockPlatform::new();
        let mut ctl = controller_with(HiddenPolicy::Continue);
        open_ready(&mut ctl, &mock, &video(1, "/videos/GYM.mp4"));
        assert_eq!(ctl.on_visibility(false, &mock), None);
        assert_eq!(ctl.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn pause_policy_does_not_resume() {
        let mock = MockPlatform::new();
        let mut ctl = controller_with(HiddenPolicy::Pause);
        open_ready(&mut ctl, &mock, &video(1, "/videos/GYM.mp4"));
        assert_eq!(ctl.on_visibility(false, &mock), Some(PlaybackPhase::Paused));
        assert_eq!(ctl.on_visibility(true, &mock), None);
        assert_eq!(ctl.phase(), PlaybackPhase::Paused);
    }

    #[test]
    fn pause_and_resume_policy_resumes_only_its_own_pause() {
        let mock = MockPlatform::new();
        let mut ctl = controller_with(HiddenPolicy::PauseAndResume);
        open_ready(&mut ctl, &mock, &video(1, "/videos/GYM.mp4"));

        assert_eq!(ctl.on_visibility(false, &mock), Some(PlaybackPhase::Paused));
        assert_eq!(ctl.on_visibility(true, &mock), Some(PlaybackPhase::Playing));

        // A viewer's pause is not undone by scrolling back
        ctl.pause(&mock);
        ctl.on_visibility(false, &mock);
        assert_eq!(ctl.on_visibility(true, &mock), None);
        assert_eq!(ctl.phase(), PlaybackPhase::Paused);
    }

    #[test]
    fn subscribers_follow_phase() {
        let mock = MockPlatform::new();
        let mut ctl = controller();
        let mut rx = ctl.subscribe();
        assert_eq!(*rx.borrow_and_update(), PlaybackPhase::Closed);

        ctl.open(&video(1, "/videos/GYM.mp4"), OVERLAY, QualityTier::High, &mock)
            .unwrap();
        assert_eq!(*rx.borrow_and_update(), PlaybackPhase::Opening);

        ctl.handle(&MediaEvent::can_play(OVERLAY, pending(&ctl)), &mock);
        assert_eq!(*rx.borrow_and_update(), PlaybackPhase::Playing);

        ctl.close(&mock);
        assert_eq!(*rx.borrow_and_update(), PlaybackPhase::Closed);
    }
}
