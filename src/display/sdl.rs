// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use display::Frontend;
use emu::screen::{Frame, SCREEN_HEIGHT, SCREEN_WIDTH};
use io::errors::{EmulatorError, Result};
use sdl2;
use sdl2::EventPump;
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::pixels::Color;
use sdl2::rect::Rect;
use sdl2::render::Canvas;
use sdl2::video::Window;

const SCALE: u32 = 4;

// Instructions executed between two looks at the event queue.
const POLL_INTERVAL: u32 = 1000;

/// A window showing the hi-res screen, one bit per pixel.
pub struct SdlDisplay {
    canvas: Canvas<Window>,
    events: EventPump,
    countdown: u32,
}

fn display_error<E: ToString>(err: E) -> EmulatorError {
    EmulatorError::Display(err.to_string())
}

impl SdlDisplay {
    pub fn new(title: &str) -> Result<SdlDisplay> {
        let context = sdl2::init().map_err(display_error)?;
        let video = context.video().map_err(display_error)?;
        let window = video.window(title, SCREEN_WIDTH as u32 * SCALE, SCREEN_HEIGHT as u32 * SCALE)
            .position_centered()
            .build()
            .map_err(display_error)?;
        let mut canvas = window.into_canvas().build().map_err(display_error)?;
        canvas.set_draw_color(Color::RGB(0, 0, 0));
        canvas.clear();
        canvas.present();

        Ok(SdlDisplay {
            canvas: canvas,
            events: context.event_pump().map_err(display_error)?,
            countdown: 0,
        })
    }
}

impl Frontend for SdlDisplay {
    fn poll_quit(&mut self) -> Result<bool> {
        if self.countdown > 0 {
            self.countdown -= 1;
            return Ok(false);
        }
        self.countdown = POLL_INTERVAL;

        while let Some(event) = self.events.poll_event() {
            match event {
                Event::Quit { .. } |
                Event::Window { win_event: WindowEvent::Close, .. } |
                Event::KeyUp { keycode: Some(Keycode::Q), .. } => return Ok(true),
                _ => {},
            }
        }
        Ok(false)
    }

    fn present(&mut self, frame: &Frame) -> Result<()> {
        self.canvas.set_draw_color(Color::RGB(0, 0, 0));
        self.canvas.clear();
        self.canvas.set_draw_color(Color::RGB(255, 255, 255));

        for y in 0..SCREEN_HEIGHT {
            for x in 0..SCREEN_WIDTH {
                if frame.pixel(x, y) {
                    let rect = Rect::new((x as u32 * SCALE) as i32, (y as u32 * SCALE) as i32, SCALE, SCALE);
                    self.canvas.fill_rect(rect).map_err(display_error)?;
                }
            }
        }

        self.canvas.present();
        Ok(())
    }
}
