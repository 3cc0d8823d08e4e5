//! Rotated text.
//!
//! A page whose glyphs run at several angles is walked once per angle,
//! each pass under the inverse rotation so that its lines come out
//! upright for the text assembler.

use std::collections::BTreeSet;

use log::debug;

use super::walker::Walk;
use crate::error::Result;
use crate::model::{Glyph, Matrix, Page};

/// Normalize a direction in `-180..=180` to `0..360`.
pub fn normalize_angle(angle: i32) -> i32 {
    (angle + 360) % 360
}

impl Walk<'_> {
    pub(super) fn angle_pass(&mut self, page: &Page) -> Result<()> {
        let mut angles = BTreeSet::new();
        let mut collect = |glyph: &Glyph| -> Result<()> {
            angles.insert(normalize_angle(glyph.angle()));
            Ok(())
        };
        self.provider.visit_glyphs(page.index, None, &mut collect)?;
        if angles.len() > 1 {
            debug!("page {} has text at angles {:?}", page.number(), angles);
        }

        let saved = self.rotation_of(page.index);
        self.set_rotation(page.index, 0);
        let mut outcome = Ok(());
        for angle in angles {
            let pass = if angle == 0 {
                self.glyph_pass(page.index, None, true)
            } else {
                let prefix = Matrix::rotation_degrees(-(angle as f32));
                self.glyph_pass(page.index, Some(&prefix), true)
            };
            if let Err(err) = pass {
                if let Err(err) = self.catchable(err) {
                    outcome = Err(err);
                    break;
                }
            }
        }
        self.set_rotation(page.index, saved);
        outcome
    }

    fn rotation_of(&self, page_index: usize) -> i32 {
        self.provider
            .document()
            .pages
            .get(page_index)
            .map_or(0, |page| page.rotation)
    }

    fn set_rotation(&mut self, page_index: usize, rotation: i32) {
        if let Some(page) = self.provider.document_mut().pages.get_mut(page_index) {
            page.rotation = rotation;
        }
    }
}
