use image::{Rgb, RgbImage};
use region_pilot_common::frame::Frame;
use region_pilot_common::proposal::{ProposalRect, ProposalSet};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Copy of `frame` with the first `max_rects` proposals drawn as unfilled
/// boxes. Later proposals are left out.
pub fn annotate(frame: &Frame, proposals: &ProposalSet, max_rects: usize) -> RgbImage {
    let mut out = frame.image().clone();
    for rect in proposals.iter().take(max_rects) {
        draw_box(&mut out, rect);
    }
    out
}

fn draw_box(image: &mut RgbImage, rect: &ProposalRect) {
    let (width, height) = image.dimensions();
    if rect.x >= width || rect.y >= height {
        return;
    }
    // The right/bottom edges sit on x + w and y + h, clipped to the image.
    let right = rect.x.saturating_add(rect.w).min(width - 1);
    let bottom = rect.y.saturating_add(rect.h).min(height - 1);

    for x in rect.x..=right {
        image.put_pixel(x, rect.y, BOX_COLOR);
        image.put_pixel(x, bottom, BOX_COLOR);
    }
    for y in rect.y..=bottom {
        image.put_pixel(rect.x, y, BOX_COLOR);
        image.put_pixel(right, y, BOX_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: [u8; 3] = [0, 0, 0];

    #[test]
    fn draws_outline_only() {
        let frame = Frame::filled(20, 20, BLACK).unwrap();
        let proposals = ProposalSet::new(vec![ProposalRect::new(2, 3, 5, 4)]);
        let out = annotate(&frame, &proposals, 100);

        assert_eq!(out.get_pixel(2, 3), &BOX_COLOR);
        assert_eq!(out.get_pixel(7, 7), &BOX_COLOR);
        assert_eq!(out.get_pixel(4, 5).0, BLACK);
        // source frame untouched
        assert_eq!(frame.image().get_pixel(2, 3).0, BLACK);
    }

    #[test]
    fn boxes_past_the_limit_are_omitted() {
        let frame = Frame::filled(20, 20, BLACK).unwrap();
        let proposals = ProposalSet::new(vec![
            ProposalRect::new(0, 0, 2, 2),
            ProposalRect::new(10, 10, 2, 2),
        ]);
        let out = annotate(&frame, &proposals, 1);
        assert_eq!(out.get_pixel(0, 0), &BOX_COLOR);
        assert_eq!(out.get_pixel(10, 10).0, BLACK);
    }

    #[test]
    fn full_frame_box_is_clipped() {
        let frame = Frame::filled(8, 6, BLACK).unwrap();
        let proposals = ProposalSet::new(vec![ProposalRect::new(0, 0, 8, 6)]);
        let out = annotate(&frame, &proposals, 100);
        assert_eq!(out.get_pixel(7, 5), &BOX_COLOR);
        assert_eq!(out.get_pixel(3, 3).0, BLACK);
    }
}
