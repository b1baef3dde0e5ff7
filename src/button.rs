//! Buttons: DefineButton, DefineButton2 and the tags that amend them,
//! DefineButtonSound and DefineButtonCxform.

use crate::config::LoaderOptions;
use crate::error::Result;
use crate::filters::{read_filters, BitmapFilter};
use crate::geometry::{ColorTransform, Matrix};
use crate::movie::{Character, CharacterId, LoadContext};
use crate::sound::{SoundSample, SoundStyle};
use crate::stream::SwfStream;
use crate::tag::TagType;

/// One character shown by the button in some of its states.
#[derive(Clone, Debug)]
pub struct ButtonRecord {
    /// Shown in the hit test state.
    pub hit_test: bool,
    /// Shown in the down state.
    pub down: bool,
    /// Shown in the over state.
    pub over: bool,
    /// Shown in the up state.
    pub up: bool,
    /// The character to show.
    pub character_id: CharacterId,
    /// The referenced definition, if it was already in the dictionary.
    pub character: Option<Character>,
    /// Display depth within the button.
    pub layer: u16,
    /// Placement of the character.
    pub matrix: Matrix,
    /// DefineButton2 only; identity for DefineButton.
    pub cxform: ColorTransform,
    /// Filters from a SWF 8 record. Parsed but not applied.
    pub filters: Vec<BitmapFilter>,
    /// Blend mode from a SWF 8 record.
    pub blend_mode: Option<u8>,
}

impl ButtonRecord {
    /// Reads a BUTTONRECORD. `Ok(None)` for the terminating zero byte or a
    /// record cut short by the end of the tag.
    pub fn read(stream: &mut SwfStream, tag: TagType, ctx: &LoadContext) -> Result<Option<ButtonRecord>> {
        if stream.bytes_left() < 1 {
            malformed!("   premature end of button record input stream, can't read flags");
            return Ok(None);
        }
        let flags = stream.read_u8()?;
        if flags == 0 {
            return Ok(None);
        }

        let has_blend_mode = flags & 0x20 != 0;
        let has_filter_list = flags & 0x10 != 0;

        if stream.bytes_left() < 2 {
            malformed!("   premature end of button record input stream, can't read character id");
            return Ok(None);
        }
        let character_id = CharacterId(stream.read_u16()?);
        let character = ctx.get_character(character_id);
        match character {
            Some(ref character) => parse_trace!(
                "   button record for states [{}] contain character {} ({:?})",
                states_string(flags),
                character_id,
                character.kind()
            ),
            None => malformed!(
                "   button record for states [{}] refer to character with id {}, \
                 which is not found in the chars dictionary",
                states_string(flags),
                character_id
            ),
        }

        if stream.bytes_left() < 2 {
            malformed!("   premature end of button record input stream, can't read button layer (depth?)");
            return Ok(None);
        }
        let layer = stream.read_u16()?;
        let matrix = Matrix::read(stream)?;

        let cxform = if tag == TagType::DEFINE_BUTTON2 {
            ColorTransform::read_rgba(stream)?
        } else {
            ColorTransform::default()
        };

        let mut filters = Vec::new();
        if has_filter_list {
            read_filters(stream, true, &mut filters)?;
            unimplemented_once!("Button filters");
        }

        let mut blend_mode = None;
        if has_blend_mode {
            stream.ensure_bytes(1)?;
            blend_mode = Some(stream.read_u8()?);
            unimplemented_once!("Button blend mode");
        }

        Ok(Some(ButtonRecord {
            hit_test: flags & 0x08 != 0,
            down: flags & 0x04 != 0,
            over: flags & 0x02 != 0,
            up: flags & 0x01 != 0,
            character_id,
            character,
            layer,
            matrix,
            cxform,
            filters,
            blend_mode,
        }))
    }

    /// Whether the referenced character could be resolved.
    pub fn is_valid(&self) -> bool {
        self.character.is_some()
    }
}

fn states_string(flags: u8) -> String {
    let names = [(0x08, "hit"), (0x04, "down"), (0x02, "over"), (0x01, "up")];
    names
        .iter()
        .filter(|&&(bit, _)| flags & bit != 0)
        .map(|&(_, name)| name)
        .collect::<Vec<_>>()
        .join(",")
}

/// Mouse and key events a button reacts to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ButtonEvent {
    /// The pointer enters the button.
    RollOver,
    /// The pointer leaves the button.
    RollOut,
    /// Pressed over the button.
    Press,
    /// Released over the button.
    Release,
    /// Dragged off while pressed.
    DragOut,
    /// Dragged back on while pressed.
    DragOver,
    /// Released after dragging off.
    ReleaseOutside,
    /// A key press, carrying the SWF key code.
    KeyPress(u8),
}

/// Action bytecode and the state transitions that run it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonAction {
    /// Transition bits, with the key code in bits 9 to 15.
    pub conditions: u16,
    /// Action bytecode, undecoded.
    pub actions: Vec<u8>,
}

impl ButtonAction {
    /// Idle to over up (roll over).
    pub const IDLE_TO_OVER_UP: u16 = 1 << 0;
    /// Over up to idle (roll out).
    pub const OVER_UP_TO_IDLE: u16 = 1 << 1;
    /// Over up to over down (press).
    pub const OVER_UP_TO_OVER_DOWN: u16 = 1 << 2;
    /// Over down to over up (release).
    pub const OVER_DOWN_TO_OVER_UP: u16 = 1 << 3;
    /// Over down to out down (drag out).
    pub const OVER_DOWN_TO_OUT_DOWN: u16 = 1 << 4;
    /// Out down to over down (drag over).
    pub const OUT_DOWN_TO_OVER_DOWN: u16 = 1 << 5;
    /// Out down to idle (release outside).
    pub const OUT_DOWN_TO_IDLE: u16 = 1 << 6;
    /// Idle to over down (drag over, menu buttons).
    pub const IDLE_TO_OVER_DOWN: u16 = 1 << 7;
    /// Over down to idle (drag out, menu buttons).
    pub const OVER_DOWN_TO_IDLE: u16 = 1 << 8;

    /// Reads the actions up to `end`. DefineButton actions have no
    /// condition word and always run on release. `Ok(None)` if a
    /// DefineButton2 condition word doesn't fit.
    pub fn read(
        stream: &mut SwfStream,
        tag: TagType,
        end: usize,
        options: &LoaderOptions,
    ) -> Result<Option<ButtonAction>> {
        let conditions = if tag == TagType::DEFINE_BUTTON {
            ButtonAction::OVER_DOWN_TO_OVER_UP
        } else {
            if stream.tell() + 2 > end {
                malformed!("Premature end of button action input: can't read conditions");
                return Ok(None);
            }
            stream.read_u16()?
        };

        parse_trace!("   button actions for conditions {:#x}", conditions);

        let length = end.saturating_sub(stream.tell());
        let actions = stream.read_bytes(length)?.to_vec();
        if options.verify_action_end && actions.last() != Some(&0) {
            malformed!("Action buffer for button conditions {:#x} doesn't end with an END action", conditions);
        }
        Ok(Some(ButtonAction {
            conditions,
            actions,
        }))
    }

    /// Key code in the upper seven bits, 0 if the action isn't bound to a
    /// key.
    pub fn key_code(&self) -> u8 {
        (self.conditions >> 9) as u8
    }

    /// Whether the action is bound to a key.
    pub fn triggered_by_key_press(&self) -> bool {
        self.key_code() != 0
    }

    /// Whether `event` runs this action.
    pub fn triggered_by(&self, event: ButtonEvent) -> bool {
        let mask = match event {
            ButtonEvent::RollOver => ButtonAction::IDLE_TO_OVER_UP,
            ButtonEvent::RollOut => ButtonAction::OVER_UP_TO_IDLE,
            ButtonEvent::Press => ButtonAction::OVER_UP_TO_OVER_DOWN,
            ButtonEvent::Release => ButtonAction::OVER_DOWN_TO_OVER_UP,
            ButtonEvent::DragOut => ButtonAction::OVER_DOWN_TO_OUT_DOWN,
            ButtonEvent::DragOver => ButtonAction::OUT_DOWN_TO_OVER_DOWN,
            ButtonEvent::ReleaseOutside => ButtonAction::OUT_DOWN_TO_IDLE,
            ButtonEvent::KeyPress(code) => {
                let key = self.key_code();
                return key != 0 && key == code;
            }
        };
        self.conditions & mask != 0
    }
}

/// The sound for one button transition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ButtonSoundInfo {
    /// Id from the DefineButtonSound tag, `None` for no sound.
    pub sound_id: Option<CharacterId>,
    /// The sound it resolved to when the tag was read.
    pub sample: Option<SoundSample>,
    /// How to play it.
    pub style: SoundStyle,
}

/// Sounds for the OverUpToIdle, IdleToOverUp, OverUpToOverDown and
/// OverDownToOverUp transitions, in that order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ButtonSoundDef {
    /// One entry per transition.
    pub sounds: [ButtonSoundInfo; 4],
}

impl ButtonSoundDef {
    /// Reads a DefineButtonSound body, after the button id.
    pub fn read(stream: &mut SwfStream, ctx: &LoadContext) -> Result<ButtonSoundDef> {
        parse_trace!("button sound options: ");
        let mut def = ButtonSoundDef::default();
        for (state, info) in def.sounds.iter_mut().enumerate() {
            stream.ensure_bytes(2)?;
            let id = stream.read_u16()?;
            if id == 0 {
                continue;
            }
            let id = CharacterId(id);
            info.sound_id = Some(id);
            info.sample = ctx.get_sound_sample(id);
            if info.sample.is_none() {
                malformed!("sound tag not found, sound_id={}, button state #={}", id, state);
            }
            parse_trace!("\tsound_id = {}", id);
            info.style = SoundStyle::read(stream)?;
        }
        Ok(def)
    }
}

/// A button character.
#[derive(Clone, Debug, Default)]
pub struct ButtonDef {
    /// All records in tag order, including ones whose character couldn't be
    /// resolved.
    pub records: Vec<ButtonRecord>,
    /// Actions in tag order.
    pub actions: Vec<ButtonAction>,
    /// Track as menu: presses carry over between buttons.
    pub menu: bool,
    /// Set by a DefineButtonSound tag.
    pub sound: Option<ButtonSoundDef>,
}

impl ButtonDef {
    /// Reads a DefineButton or DefineButton2 body, after the character id.
    pub fn read(stream: &mut SwfStream, tag: TagType, ctx: &LoadContext) -> Result<ButtonDef> {
        let mut button = ButtonDef::default();
        if tag == TagType::DEFINE_BUTTON {
            button.read_define_button(stream, ctx)?;
        } else {
            button.read_define_button2(stream, ctx)?;
        }
        Ok(button)
    }

    fn read_define_button(&mut self, stream: &mut SwfStream, ctx: &LoadContext) -> Result<()> {
        let end = stream.get_tag_end_position();
        while let Some(record) = ButtonRecord::read(stream, TagType::DEFINE_BUTTON, ctx)? {
            self.records.push(record);
        }

        if stream.tell() >= end {
            malformed!("Premature end of DEFINEBUTTON tag, won't read actions");
            return Ok(());
        }
        if let Some(action) = ButtonAction::read(stream, TagType::DEFINE_BUTTON, end, ctx.options())? {
            self.actions.push(action);
        }
        Ok(())
    }

    fn read_define_button2(&mut self, stream: &mut SwfStream, ctx: &LoadContext) -> Result<()> {
        stream.ensure_bytes(1 + 2)?;
        self.menu = stream.read_u8()? != 0;
        if self.menu {
            unimplemented_once!("DEFINEBUTTON2 'menu' flag");
        }

        let action_offset = stream.read_u16()? as usize;
        let tag_end = stream.get_tag_end_position();
        let mut next_action_pos = (stream.tell() + action_offset).saturating_sub(2);
        if next_action_pos > tag_end {
            malformed!(
                "Next Button2 actionOffset ({}) points past the end of tag ({})",
                action_offset,
                tag_end
            );
            return Ok(());
        }

        while stream.tell() < tag_end {
            match ButtonRecord::read(stream, TagType::DEFINE_BUTTON2, ctx)? {
                Some(record) => self.records.push(record),
                None => break,
            }
        }

        if action_offset == 0 {
            return Ok(());
        }
        if !stream.seek(next_action_pos) {
            malformed!("Button2 action offset {} is unreachable", action_offset);
            return Ok(());
        }

        while stream.tell() < tag_end {
            stream.ensure_bytes(2)?;
            let next_offset = stream.read_u16()? as usize;
            if next_offset != 0 {
                next_action_pos = (stream.tell() + next_offset).saturating_sub(2);
                if next_action_pos > tag_end {
                    malformed!(
                        "Next action offset ({}) in Button2ActionConditions points past the end of tag",
                        next_offset
                    );
                    next_action_pos = tag_end;
                }
            }
            let end = if next_offset != 0 { next_action_pos } else { tag_end };
            if let Some(action) = ButtonAction::read(stream, TagType::DEFINE_BUTTON2, end, ctx.options())? {
                self.actions.push(action);
            }
            if next_offset == 0 || !stream.seek(next_action_pos) {
                break;
            }
        }
        Ok(())
    }

    /// DefineButtonCxform: one RGB colour transform per record, in record
    /// order.
    pub fn read_cxform(&mut self, stream: &mut SwfStream) -> Result<()> {
        for record in &mut self.records {
            record.cxform = ColorTransform::read_rgb(stream)?;
            parse_trace!("Read DefineButtonCxform: {:?}", record.cxform);
        }
        Ok(())
    }

    /// Records that can be instantiated, in layer order as authored.
    pub fn valid_records(&self) -> impl Iterator<Item = &ButtonRecord> {
        self.records.iter().filter(|record| record.is_valid())
    }

    /// Actions run for `event`.
    pub fn actions_for(&self, event: ButtonEvent) -> impl Iterator<Item = &ButtonAction> {
        self.actions
            .iter()
            .filter(move |action| action.triggered_by(event))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{LoaderOptions, LoaderServices};
    use crate::movie::MovieDefinition;
    use crate::sound::tests::RecordingSoundHandler;
    use crate::sound::SoundHandler;
    use crate::test_util::{capture_logs, empty_shape, swf_file, tag, BitWriter};

    fn load(tags: &[Vec<u8>]) -> MovieDefinition {
        let bytes = swf_file(8, 1, tags);
        MovieDefinition::load(&bytes[..], LoaderServices::default(), LoaderOptions::default()).unwrap()
    }

    fn button(movie: &MovieDefinition, id: u16) -> Arc<ButtonDef> {
        match movie.dictionary().get(CharacterId(id)) {
            Some(Character::Button(button)) => button,
            other => panic!("expected a button, got {:?}", other),
        }
    }

    fn record(w: &mut BitWriter, states: u8, id: u16, layer: u16) {
        w.u8(states).u16(id).u16(layer);
        // identity matrix
        w.u8(0x00);
    }

    #[test]
    fn conditions_decode_transitions_and_keys() {
        let action = ButtonAction {
            conditions: ButtonAction::IDLE_TO_OVER_UP | ButtonAction::OUT_DOWN_TO_IDLE,
            actions: vec![0],
        };
        assert!(action.triggered_by(ButtonEvent::RollOver));
        assert!(action.triggered_by(ButtonEvent::ReleaseOutside));
        assert!(!action.triggered_by(ButtonEvent::Press));
        assert!(!action.triggered_by(ButtonEvent::KeyPress(0)));
        assert!(!action.triggered_by_key_press());

        let key_only = ButtonAction {
            conditions: 13 << 9,
            actions: vec![0],
        };
        assert_eq!(key_only.key_code(), 13);
        assert!(key_only.triggered_by(ButtonEvent::KeyPress(13)));
        assert!(!key_only.triggered_by(ButtonEvent::KeyPress(14)));
        assert!(!key_only.triggered_by(ButtonEvent::RollOver));
        assert!(!key_only.triggered_by(ButtonEvent::Release));
    }

    #[test]
    fn define_button_keeps_unresolved_records_in_order() {
        let mut w = BitWriter::new();
        w.u16(10);
        record(&mut w, 0x01, 1, 1);
        record(&mut w, 0x02, 99, 2);
        record(&mut w, 0x0C, 1, 3);
        w.u8(0);
        w.bytes(&[0x07, 0x00]);
        let (movie, logs) = capture_logs(|| load(&[empty_shape(1), tag(7, &w.into_bytes())]));

        let button = button(&movie, 10);
        assert_eq!(button.records.len(), 3);
        let layers: Vec<u16> = button.valid_records().map(|r| r.layer).collect();
        assert_eq!(layers, vec![1, 3]);
        assert!(!button.records[1].is_valid());
        assert!(button.records[2].hit_test && button.records[2].down);
        assert!(logs.contains("which is not found in the chars dictionary"));

        assert_eq!(button.actions.len(), 1);
        assert_eq!(button.actions[0].conditions, ButtonAction::OVER_DOWN_TO_OVER_UP);
        assert_eq!(button.actions[0].actions, vec![0x07, 0x00]);
        assert_eq!(button.actions_for(ButtonEvent::Release).count(), 1);
    }

    #[test]
    fn define_button2_reads_chained_actions() {
        let mut w = BitWriter::new();
        w.u16(11).u8(0);
        // action offset counts from its own position
        let mut records = BitWriter::new();
        record(&mut records, 0x01, 1, 1);
        // cxform: no add, no mult
        records.u8(0x00);
        records.u8(0);
        let records = records.into_bytes();
        w.u16(records.len() as u16 + 2);
        w.bytes(&records);
        // first action: 4 byte header + 2 byte body
        w.u16(6).u16(ButtonAction::IDLE_TO_OVER_UP).bytes(&[0x06, 0x00]);
        w.u16(0).u16(ButtonAction::OVER_UP_TO_IDLE | (65 << 9)).bytes(&[0x00]);
        let movie = load(&[empty_shape(1), tag(34, &w.into_bytes())]);

        let button = button(&movie, 11);
        assert_eq!(button.valid_records().count(), 1);
        assert_eq!(button.actions.len(), 2);
        assert_eq!(button.actions[0].actions, vec![0x06, 0x00]);
        assert!(button.actions[0].triggered_by(ButtonEvent::RollOver));
        assert!(button.actions[1].triggered_by(ButtonEvent::RollOut));
        assert!(button.actions[1].triggered_by(ButtonEvent::KeyPress(65)));
    }

    #[test]
    fn action_without_end_is_reported() {
        let mut w = BitWriter::new();
        w.u16(12);
        record(&mut w, 0x01, 1, 1);
        w.u8(0);
        w.bytes(&[0x07]);
        let (_, logs) = capture_logs(|| load(&[empty_shape(1), tag(7, &w.into_bytes())]));
        assert!(logs.contains("doesn't end with an END action"));
    }

    #[test]
    fn cxform_and_sound_amend_the_button() {
        let handler = Arc::new(RecordingSoundHandler::default());
        let sound_handler: Arc<dyn SoundHandler> = handler.clone();

        let mut def = BitWriter::new();
        def.u16(20);
        record(&mut def, 0x01, 1, 1);
        def.u8(0).u8(0);

        let mut cxform = BitWriter::new();
        // add terms only, 9 bits each
        cxform.u16(20).bit(true).bit(false).ubits(4, 9);
        cxform.sbits(9, 10).sbits(9, -10).sbits(9, 0).align();

        let mut sound = BitWriter::new();
        sound.u16(20).u16(0).u16(5).u8(0x20).u16(0).u16(0);
        let sound = sound.into_bytes();

        let define_sound = {
            let mut w = BitWriter::new();
            w.u16(5).u8(0x0A).u32(10).bytes(&[0; 4]);
            tag(14, &w.into_bytes())
        };

        let tags = [
            empty_shape(1),
            define_sound,
            tag(7, &def.into_bytes()),
            tag(23, &cxform.into_bytes()),
            tag(17, &sound),
            tag(17, &sound),
        ];
        let bytes = swf_file(8, 1, &tags);
        let services = LoaderServices::default().with_sound_handler(sound_handler);
        let (movie, logs) = capture_logs(|| {
            MovieDefinition::load(&bytes[..], services, LoaderOptions::default()).unwrap()
        });

        let button = button(&movie, 20);
        assert_eq!(button.records[0].cxform.r_add, 10);
        assert_eq!(button.records[0].cxform.g_add, -10);
        assert_eq!(button.records[0].cxform.r_mult, 256);

        let sounds = button.sound.as_ref().unwrap();
        assert_eq!(sounds.sounds[0].sound_id, None);
        assert_eq!(sounds.sounds[1].sound_id, Some(CharacterId(5)));
        assert_eq!(sounds.sounds[1].sample.unwrap().handler_id, 100);
        assert!(sounds.sounds[1].style.stop_playback);
        assert!(logs.contains("Attempt to redefine button sound ignored"));
    }
}
