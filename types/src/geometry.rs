//! Integer geometry on a toroidal arena.
//!
//! Coordinates grow right and down from the top-left corner. The arena wraps:
//! a rectangle leaving through the right edge re-enters on the left.

use serde::{Deserialize, Serialize};

pub type GameInt = u16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: GameInt,
    pub y: GameInt,
}

impl Point {
    #[must_use]
    pub const fn new(x: GameInt, y: GameInt) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn is_below(self, other: Point) -> bool {
        self.y > other.y
    }

    #[must_use]
    pub fn is_right_of(self, other: Point) -> bool {
        self.x > other.x
    }

    #[must_use]
    pub fn at_x(self, x: GameInt) -> Self {
        Self { x, y: self.y }
    }

    #[must_use]
    pub fn at_y(self, y: GameInt) -> Self {
        Self { x: self.x, y }
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x.saturating_add(other.x),
            y: self.y.saturating_add(other.y),
        }
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x.saturating_sub(other.x),
            y: self.y.saturating_sub(other.y),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rectangle {
    pub top_left: Point,
    pub width: GameInt,
    pub height: GameInt,
}

impl Rectangle {
    #[must_use]
    pub const fn new(top_left: Point, width: GameInt, height: GameInt) -> Self {
        Self {
            top_left,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn square(top_left: Point, side: GameInt) -> Self {
        Self::new(top_left, side, side)
    }

    /// Exclusive right edge. May lie past the arena when the rectangle wraps.
    #[must_use]
    pub fn right(&self) -> u32 {
        u32::from(self.top_left.x) + u32::from(self.width)
    }

    /// Exclusive bottom edge. May lie past the arena when the rectangle wraps.
    #[must_use]
    pub fn bottom(&self) -> u32 {
        u32::from(self.top_left.y) + u32::from(self.height)
    }

    /// Saturates at `GameInt::MAX`; use [`Rectangle::right`] / [`Rectangle::bottom`]
    /// for exact edges.
    #[must_use]
    pub fn bottom_right(&self) -> Point {
        self.top_left + Point::new(self.width, self.height)
    }

    #[must_use]
    pub fn center(&self) -> Point {
        self.top_left + Point::new(self.width / 2, self.height / 2)
    }

    /// Plain intersection, ignoring wrap-around. Touching edges do not overlap.
    #[must_use]
    pub fn overlap(&self, other: &Rectangle) -> Option<Rectangle> {
        let x = self.top_left.x.max(other.top_left.x);
        let y = self.top_left.y.max(other.top_left.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if u32::from(x) < right && u32::from(y) < bottom {
            Some(Rectangle {
                top_left: Point { x, y },
                width: (right - u32::from(x)) as GameInt,
                height: (bottom - u32::from(y)) as GameInt,
            })
        } else {
            None
        }
    }

    /// Intersection on the torus whose bottom-right corner is `bounds`.
    ///
    /// `other` is also tested shifted one arena width and/or height in each
    /// direction, so rectangles straddling an edge collide with rectangles on
    /// the opposite side. The returned top-left is wrapped back into bounds.
    #[must_use]
    pub fn wrapped_overlap(&self, other: &Rectangle, bounds: Point) -> Option<Rectangle> {
        let w = i64::from(bounds.x);
        let h = i64::from(bounds.y);
        let sx = i64::from(self.top_left.x);
        let sy = i64::from(self.top_left.y);
        let s_right = sx + i64::from(self.width);
        let s_bottom = sy + i64::from(self.height);

        for dx in [0, -w, w] {
            for dy in [0, -h, h] {
                let ox = i64::from(other.top_left.x) + dx;
                let oy = i64::from(other.top_left.y) + dy;
                let x = sx.max(ox);
                let y = sy.max(oy);
                let right = s_right.min(ox + i64::from(other.width));
                let bottom = s_bottom.min(oy + i64::from(other.height));
                if x < right && y < bottom {
                    return Some(Rectangle {
                        top_left: Point {
                            x: wrap(x, w),
                            y: wrap(y, h),
                        },
                        width: (right - x) as GameInt,
                        height: (bottom - y) as GameInt,
                    });
                }
            }
        }
        None
    }

    /// Split into the in-bounds pieces visible on an arena of size `bounds`.
    ///
    /// A rectangle crossing the right and/or bottom edge yields up to four
    /// pieces; one fully inside yields itself.
    #[must_use]
    pub fn wrapped_parts(&self, bounds: Point) -> Vec<Rectangle> {
        let right_overflow = self.right().saturating_sub(u32::from(bounds.x)) as GameInt;
        let bottom_overflow = self.bottom().saturating_sub(u32::from(bounds.y)) as GameInt;
        let main_width = self.width.saturating_sub(right_overflow);
        let main_height = self.height.saturating_sub(bottom_overflow);

        let mut parts = vec![Rectangle::new(self.top_left, main_width, main_height)];
        if right_overflow > 0 {
            parts.push(Rectangle::new(
                self.top_left.at_x(0),
                right_overflow,
                main_height,
            ));
        }
        if bottom_overflow > 0 {
            parts.push(Rectangle::new(
                self.top_left.at_y(0),
                main_width,
                bottom_overflow,
            ));
        }
        if right_overflow > 0 && bottom_overflow > 0 {
            parts.push(Rectangle::new(
                Point::new(0, 0),
                right_overflow,
                bottom_overflow,
            ));
        }
        parts.retain(|r| r.width > 0 && r.height > 0);
        parts
    }
}

fn wrap(value: i64, modulus: i64) -> GameInt {
    if modulus == 0 {
        return 0;
    }
    value.rem_euclid(modulus) as GameInt
}

/// Move `value` by `delta` (negative = left/up) on a ring of size `modulus`.
pub(crate) fn wrapping_offset(value: GameInt, delta: i64, modulus: GameInt) -> GameInt {
    wrap(i64::from(value) + delta, i64::from(modulus))
}
