// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element validity oracle.

use crate::host::{MediaHost, Visibility};

/// Whether `el` is currently a legitimate target for an overlay.
///
/// True iff the element is of the media kind, connected to the document, and
/// neither `display: none` nor `visibility: hidden`/`collapse`. Pure: reads
/// the host and nothing else.
#[must_use]
pub fn is_valid<H: MediaHost>(host: &H, el: &H::Element) -> bool {
    host.is_media(el)
        && host.is_connected(el)
        && host.layout_style(el).visibility == Visibility::Visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDom;

    #[test]
    fn connected_visible_video_is_valid() {
        let mut dom = FakeDom::new();
        let body = dom.body();
        let video = dom.add_video(Some(body), "a.mp4");
        assert!(is_valid(&dom, &video));
    }

    #[test]
    fn non_media_is_invalid() {
        let mut dom = FakeDom::new();
        let body = dom.body();
        let div = dom.add_div(Some(body));
        assert!(!is_valid(&dom, &div));
    }

    #[test]
    fn disconnected_is_invalid() {
        let mut dom = FakeDom::new();
        let body = dom.body();
        let wrapper = dom.add_div(Some(body));
        let video = dom.add_video(Some(wrapper), "a.mp4");
        dom.detach_node(wrapper);
        assert!(!is_valid(&dom, &video), "ancestor removal disconnects");
    }

    #[test]
    fn hidden_and_not_displayed_are_invalid() {
        let mut dom = FakeDom::new();
        let body = dom.body();
        let video = dom.add_video(Some(body), "a.mp4");
        dom.set_visibility(video, Visibility::Hidden);
        assert!(!is_valid(&dom, &video));
        dom.set_visibility(video, Visibility::NotDisplayed);
        assert!(!is_valid(&dom, &video));
        dom.set_visibility(video, Visibility::Visible);
        assert!(is_valid(&dom, &video));
    }
}
