//! The loaded movie: its dictionary of characters, timeline bookkeeping and
//! the parse context tag loaders work through.
//!
//! A movie is filled in by a single parse pass, possibly on a background
//! thread while other threads already query it. Characters are built
//! completely before they are published in a dictionary, and published
//! characters are never modified in place: tags that amend an earlier
//! definition build an amended copy and swap it in.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::thread;

use crate::bitmap::BitmapDef;
use crate::button::ButtonDef;
use crate::config::{LoaderOptions, LoaderServices};
use crate::error::{Error, Result};
use crate::font::Font;
use crate::geometry::Rgba;
use crate::morph::MorphShapeDef;
use crate::shape::ShapeDef;
use crate::sound::{SoundSample, SoundStreamHead};
use crate::stream::SwfStream;
use crate::tag;
use crate::text::{EditTextDef, FontResolver, TextDef};
use crate::SwfHeaders;

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Key of a character in a dictionary.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CharacterId(pub u16);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type of a `Character`, without its data.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CharacterKind {
    /// A font.
    Font,
    /// A shape.
    Shape,
    /// A morph shape.
    MorphShape,
    /// A sprite.
    Sprite,
    /// An event sound.
    Sound,
    /// A bitmap.
    Bitmap,
    /// A button.
    Button,
    /// A text field.
    EditText,
    /// Static text.
    Text,
}

/// A dictionary entry.
#[derive(Clone, Debug)]
pub enum Character {
    /// DefineFont, DefineFont2 or DefineFont3.
    Font(Arc<Font>),
    /// DefineShape 1 to 4.
    Shape(Arc<ShapeDef>),
    /// DefineMorphShape or DefineMorphShape2.
    MorphShape(Arc<MorphShapeDef>),
    /// DefineSprite.
    Sprite(Arc<SpriteDefinition>),
    /// DefineSound, as registered with the sound handler.
    Sound(SoundSample),
    /// DefineBits, DefineBitsJPEG2/3 or DefineBitsLossless/2.
    Bitmap(Arc<BitmapDef>),
    /// DefineButton or DefineButton2.
    Button(Arc<ButtonDef>),
    /// DefineEditText.
    EditText(Arc<EditTextDef>),
    /// DefineText or DefineText2.
    Text(Arc<TextDef>),
}

impl Character {
    /// What kind of character this is.
    pub fn kind(&self) -> CharacterKind {
        match *self {
            Character::Font(_) => CharacterKind::Font,
            Character::Shape(_) => CharacterKind::Shape,
            Character::MorphShape(_) => CharacterKind::MorphShape,
            Character::Sprite(_) => CharacterKind::Sprite,
            Character::Sound(_) => CharacterKind::Sound,
            Character::Bitmap(_) => CharacterKind::Bitmap,
            Character::Button(_) => CharacterKind::Button,
            Character::EditText(_) => CharacterKind::EditText,
            Character::Text(_) => CharacterKind::Text,
        }
    }
}

/// Characters by id. Safe to query while the loader is still adding to it.
#[derive(Debug, Default)]
pub struct Dictionary {
    characters: RwLock<HashMap<CharacterId, Character>>,
}

impl Dictionary {
    /// An empty dictionary.
    pub fn new() -> Self {
        Dictionary::default()
    }

    /// Publishes a character. Redefining an id is malformed; the newest
    /// definition is kept.
    pub fn define(&self, id: CharacterId, character: Character) {
        let kind = character.kind();
        let previous = write_lock(&self.characters).insert(id, character);
        if let Some(previous) = previous {
            malformed!(
                "Character id {} redefined (was a {:?}, now a {:?}), keeping the newest definition",
                id,
                previous.kind(),
                kind
            );
        }
    }

    /// Swaps in an amended copy of an existing character. Returns false,
    /// leaving the dictionary alone, if `id` isn't defined.
    pub fn replace(&self, id: CharacterId, character: Character) -> bool {
        match write_lock(&self.characters).get_mut(&id) {
            Some(slot) => {
                *slot = character;
                true
            }
            None => false,
        }
    }

    /// The character defined as `id`.
    pub fn get(&self, id: CharacterId) -> Option<Character> {
        read_lock(&self.characters).get(&id).cloned()
    }

    /// Whether `id` is defined.
    pub fn contains(&self, id: CharacterId) -> bool {
        read_lock(&self.characters).contains_key(&id)
    }

    /// The font defined as `id`, `None` if `id` is something else.
    pub fn get_font(&self, id: CharacterId) -> Option<Arc<Font>> {
        match self.get(id)? {
            Character::Font(font) => Some(font),
            _ => None,
        }
    }

    /// The sound defined as `id`.
    pub fn get_sound_sample(&self, id: CharacterId) -> Option<SoundSample> {
        match self.get(id)? {
            Character::Sound(sample) => Some(sample),
            _ => None,
        }
    }

    /// The button defined as `id`.
    pub fn get_button(&self, id: CharacterId) -> Option<Arc<ButtonDef>> {
        match self.get(id)? {
            Character::Button(button) => Some(button),
            _ => None,
        }
    }

    /// The sprite defined as `id`.
    pub fn get_sprite(&self, id: CharacterId) -> Option<Arc<SpriteDefinition>> {
        match self.get(id)? {
            Character::Sprite(sprite) => Some(sprite),
            _ => None,
        }
    }

    /// Number of defined characters.
    pub fn len(&self) -> usize {
        read_lock(&self.characters).len()
    }

    /// Whether nothing is defined.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Defined ids in ascending order.
    pub fn ids(&self) -> Vec<CharacterId> {
        let mut ids: Vec<CharacterId> = read_lock(&self.characters).keys().copied().collect();
        ids.sort();
        ids
    }
}

/// Frame bookkeeping of a movie or sprite.
#[derive(Debug, Default)]
pub struct Timeline {
    frame_count: u16,
    loaded_frames: AtomicUsize,
    labels: RwLock<HashMap<String, usize>>,
}

impl Timeline {
    /// A timeline with nothing loaded yet.
    pub fn new(frame_count: u16) -> Self {
        Timeline {
            frame_count,
            ..Timeline::default()
        }
    }

    /// Frame count declared in the header.
    pub fn frame_count(&self) -> u16 {
        self.frame_count
    }

    /// Frames whose ShowFrame tag has been read.
    pub fn loaded_frames(&self) -> usize {
        self.loaded_frames.load(Ordering::Acquire)
    }

    /// Zero based frame a label names.
    pub fn frame_number(&self, label: &str) -> Option<usize> {
        read_lock(&self.labels).get(label).copied()
    }

    /// Labels with their frames, in frame order.
    pub fn labels(&self) -> Vec<(String, usize)> {
        let mut labels: Vec<(String, usize)> = read_lock(&self.labels)
            .iter()
            .map(|(name, &frame)| (name.clone(), frame))
            .collect();
        labels.sort_by_key(|&(_, frame)| frame);
        labels
    }

    fn add_label(&self, label: &str) {
        let frame = self.loaded_frames();
        write_lock(&self.labels).insert(label.to_string(), frame);
    }

    fn show_frame(&self) -> usize {
        self.loaded_frames.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// A DefineSprite: a nested timeline with its own character namespace.
#[derive(Debug)]
pub struct SpriteDefinition {
    id: CharacterId,
    dictionary: Arc<Dictionary>,
    timeline: Timeline,
}

impl SpriteDefinition {
    /// Wraps a dictionary and timeline filled in through a sprite context.
    pub(crate) fn new(id: CharacterId, dictionary: Arc<Dictionary>, timeline: Timeline) -> Self {
        SpriteDefinition {
            id,
            dictionary,
            timeline,
        }
    }

    /// The sprite's id in the enclosing dictionary.
    pub fn id(&self) -> CharacterId {
        self.id
    }

    /// Characters defined inside the sprite.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Frames and labels of the sprite.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Frame count from the DefineSprite tag.
    pub fn get_frame_count(&self) -> u16 {
        self.timeline.frame_count()
    }
}

/// FileAttributes flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FileAttributes {
    /// SWF 10 direct blit hint.
    pub use_direct_blit: bool,
    /// SWF 10 GPU compositing hint.
    pub use_gpu: bool,
    /// A Metadata tag is present.
    pub has_metadata: bool,
    /// The movie uses ActionScript 3.
    pub action_script3: bool,
    /// Local playback may use the network.
    pub use_network: bool,
}

impl FileAttributes {
    /// Decodes the flags word of a FileAttributes tag.
    pub fn from_bits(flags: u32) -> Self {
        FileAttributes {
            use_direct_blit: flags & 0x40 != 0,
            use_gpu: flags & 0x20 != 0,
            has_metadata: flags & 0x10 != 0,
            action_script3: flags & 0x08 != 0,
            use_network: flags & 0x01 != 0,
        }
    }
}

#[derive(Debug, Default)]
struct MovieInfo {
    exports: HashMap<String, CharacterId>,
    jpeg_tables: Option<Arc<Vec<u8>>>,
    background_color: Option<Rgba>,
    file_attributes: Option<FileAttributes>,
    metadata: Option<String>,
}

/// A SWF movie and everything its tags defined.
#[derive(Debug)]
pub struct MovieDefinition {
    headers: SwfHeaders,
    dictionary: Arc<Dictionary>,
    timeline: Timeline,
    info: RwLock<MovieInfo>,
    services: LoaderServices,
    options: LoaderOptions,
    cancelled: AtomicBool,
    load_complete: AtomicBool,
}

impl MovieDefinition {
    fn new(headers: SwfHeaders, services: LoaderServices, options: LoaderOptions) -> Self {
        MovieDefinition {
            timeline: Timeline::new(headers.frame_count()),
            headers,
            dictionary: Arc::new(Dictionary::new()),
            info: RwLock::new(MovieInfo::default()),
            services,
            options,
            cancelled: AtomicBool::new(false),
            load_complete: AtomicBool::new(false),
        }
    }

    fn read_body<R: Read>(reader: R) -> Result<(SwfHeaders, Vec<u8>)> {
        let (headers, mut decoded) = SwfHeaders::read_from(reader)?;
        let mut body = Vec::new();
        decoded.read_to_end(&mut body).map_err(Error::IoError)?;
        let declared = (headers.file_length() as usize).saturating_sub(headers.header_length());
        if body.len() < declared {
            malformed!(
                "SWF header advertises {} bytes of tags, but only {} could be read",
                declared,
                body.len()
            );
        }
        Ok((headers, body))
    }

    /// Reads a whole movie on the calling thread.
    ///
    /// Only an unreadable header is an error. Broken tags are logged and
    /// skipped, leaving whatever could be read.
    pub fn load<R: Read>(reader: R, services: LoaderServices, options: LoaderOptions) -> Result<MovieDefinition> {
        let (headers, body) = Self::read_body(reader)?;
        let movie = MovieDefinition::new(headers, services, options);
        movie.load_tags(&body);
        Ok(movie)
    }

    /// Reads the header, then parses the tags on a background thread. The
    /// returned movie can be queried while loading goes on.
    pub fn spawn_load<R: Read>(
        reader: R,
        services: LoaderServices,
        options: LoaderOptions,
    ) -> Result<(Arc<MovieDefinition>, thread::JoinHandle<()>)> {
        let (headers, body) = Self::read_body(reader)?;
        let movie = Arc::new(MovieDefinition::new(headers, services, options));
        let loader = movie.clone();
        let handle = thread::Builder::new()
            .name("swf-loader".to_string())
            .spawn(move || loader.load_tags(&body))
            .map_err(Error::IoError)?;
        Ok((movie, handle))
    }

    fn load_tags(&self, body: &[u8]) {
        let mut stream = SwfStream::new(body);
        let mut ctx = LoadContext::root(self);
        if let Err(err) = tag::read_tags(&mut stream, &mut ctx) {
            log::error!("Error while parsing SWF stream: {}", err);
        }
        self.complete_load();
    }

    /// Asks the loader to stop before the next tag. Characters already
    /// published stay valid.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether `cancel` was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Marks loading as finished.
    pub fn complete_load(&self) {
        self.load_complete.store(true, Ordering::Release);
        parse_trace!(
            "Load complete: {} of {} frames, {} characters",
            self.timeline.loaded_frames(),
            self.timeline.frame_count(),
            self.dictionary.len()
        );
    }

    /// Whether the loader has finished, normally or not.
    pub fn is_load_complete(&self) -> bool {
        self.load_complete.load(Ordering::Acquire)
    }

    /// The header.
    pub fn headers(&self) -> &SwfHeaders {
        &self.headers
    }

    /// SWF version from the header.
    pub fn version(&self) -> u8 {
        self.headers.version()
    }

    /// The root dictionary.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// The root timeline.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Frame count from the header.
    pub fn get_frame_count(&self) -> u16 {
        self.timeline.frame_count()
    }

    /// Frames loaded so far.
    pub fn get_loading_frame(&self) -> usize {
        self.timeline.loaded_frames()
    }

    /// Services the movie was loaded with.
    pub fn services(&self) -> &LoaderServices {
        &self.services
    }

    /// Options the movie was loaded with.
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// The character exported under `name`.
    pub fn get_exported_resource(&self, name: &str) -> Option<Character> {
        let id = *read_lock(&self.info).exports.get(name)?;
        self.dictionary.get(id)
    }

    /// Exported names with their ids, sorted by name.
    pub fn exports(&self) -> Vec<(String, CharacterId)> {
        let mut exports: Vec<(String, CharacterId)> = read_lock(&self.info)
            .exports
            .iter()
            .map(|(name, &id)| (name.clone(), id))
            .collect();
        exports.sort();
        exports
    }

    /// Tables from the JPEGTables tag.
    pub fn jpeg_tables(&self) -> Option<Arc<Vec<u8>>> {
        read_lock(&self.info).jpeg_tables.clone()
    }

    /// From SetBackgroundColor.
    pub fn background_color(&self) -> Option<Rgba> {
        read_lock(&self.info).background_color
    }

    /// From FileAttributes.
    pub fn file_attributes(&self) -> Option<FileAttributes> {
        read_lock(&self.info).file_attributes
    }

    /// XMP metadata from the Metadata tag.
    pub fn metadata(&self) -> Option<String> {
        read_lock(&self.info).metadata.clone()
    }
}

/// What a tag loader sees: the movie being loaded, the dictionary and
/// timeline tags currently go to, and the dictionaries of the enclosing
/// movie and sprites for lookups.
pub struct LoadContext<'a> {
    movie: &'a MovieDefinition,
    dictionary: Arc<Dictionary>,
    parents: Vec<Arc<Dictionary>>,
    timeline: &'a Timeline,
    sprite_depth: usize,
    sound_stream: Option<SoundStreamHead>,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn root(movie: &'a MovieDefinition) -> Self {
        LoadContext {
            movie,
            dictionary: movie.dictionary.clone(),
            parents: Vec::new(),
            timeline: &movie.timeline,
            sprite_depth: 0,
            sound_stream: None,
        }
    }

    /// Context for the tags of a sprite defined in this context.
    pub(crate) fn sprite<'b>(&self, dictionary: Arc<Dictionary>, timeline: &'b Timeline) -> LoadContext<'b>
    where
        'a: 'b,
    {
        let mut parents = self.parents.clone();
        parents.push(self.dictionary.clone());
        LoadContext {
            movie: self.movie,
            dictionary,
            parents,
            timeline,
            sprite_depth: self.sprite_depth + 1,
            sound_stream: None,
        }
    }

    /// The movie being loaded.
    pub fn movie(&self) -> &MovieDefinition {
        self.movie
    }

    /// The movie's services.
    pub fn services(&self) -> &LoaderServices {
        &self.movie.services
    }

    /// The movie's options.
    pub fn options(&self) -> &LoaderOptions {
        &self.movie.options
    }

    /// SWF version of the movie.
    pub fn version(&self) -> u8 {
        self.movie.version()
    }

    /// Whether tags are being read inside a DefineSprite.
    pub fn is_sprite(&self) -> bool {
        self.sprite_depth > 0
    }

    /// Number of enclosing DefineSprite tags.
    pub fn sprite_depth(&self) -> usize {
        self.sprite_depth
    }

    /// Whether the movie's load was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.movie.is_cancelled()
    }

    /// Innermost dictionary first.
    fn dictionaries(&self) -> impl Iterator<Item = &Arc<Dictionary>> {
        std::iter::once(&self.dictionary).chain(self.parents.iter().rev())
    }

    /// Looks `id` up, innermost dictionary first.
    pub fn get_character(&self, id: CharacterId) -> Option<Character> {
        self.dictionaries().find_map(|dictionary| dictionary.get(id))
    }

    /// Looks a font up, innermost dictionary first.
    pub fn get_font(&self, id: CharacterId) -> Option<Arc<Font>> {
        self.dictionaries().find_map(|dictionary| dictionary.get_font(id))
    }

    /// Looks a button up, innermost dictionary first.
    pub fn get_button(&self, id: CharacterId) -> Option<Arc<ButtonDef>> {
        self.dictionaries().find_map(|dictionary| dictionary.get_button(id))
    }

    /// Looks a sound up, innermost dictionary first.
    pub fn get_sound_sample(&self, id: CharacterId) -> Option<SoundSample> {
        self.dictionaries()
            .find_map(|dictionary| dictionary.get_sound_sample(id))
    }

    /// Defines a character in the current dictionary.
    pub fn add_character(&self, id: CharacterId, character: Character) {
        self.dictionary.define(id, character);
    }

    /// Defines a font in the current dictionary.
    pub fn add_font(&self, id: CharacterId, font: Arc<Font>) {
        self.add_character(id, Character::Font(font));
    }

    /// Defines a sound in the current dictionary.
    pub fn add_sound_sample(&self, id: CharacterId, sample: SoundSample) {
        self.add_character(id, Character::Sound(sample));
    }

    /// Replaces `id` in whichever visible dictionary defines it.
    pub fn replace(&self, id: CharacterId, character: Character) -> bool {
        self.dictionaries()
            .find(|dictionary| dictionary.contains(id))
            .map_or(false, |dictionary| dictionary.replace(id, character))
    }

    /// Font lookup for definitions that resolve fonts after loading. Holds
    /// the dictionaries weakly.
    pub fn font_resolver(&self) -> FontResolver {
        let chain: Vec<Weak<Dictionary>> = self.dictionaries().map(Arc::downgrade).collect();
        Arc::new(move |id| {
            chain
                .iter()
                .filter_map(Weak::upgrade)
                .find_map(|dictionary| dictionary.get_font(id))
        })
    }

    /// Labels the frame being loaded.
    pub fn add_frame_name(&self, label: &str) {
        self.timeline.add_label(label);
    }

    /// Ends the frame being loaded.
    pub fn show_frame(&self) {
        let loaded = self.timeline.show_frame();
        parse_trace!("  show_frame ({} loaded)", loaded);
        if loaded > self.timeline.frame_count() as usize {
            malformed!(
                "More ShowFrame tags ({}) than the {} frames advertised",
                loaded,
                self.timeline.frame_count()
            );
        }
    }

    /// Sets the stream SoundStreamBlock tags on this timeline go to.
    pub fn set_loading_sound_stream(&mut self, head: Option<SoundStreamHead>) {
        self.sound_stream = head;
    }

    /// The stream opened by the last SoundStreamHead on this timeline.
    pub fn loading_sound_stream(&self) -> Option<SoundStreamHead> {
        self.sound_stream
    }

    /// Exports `id` under `name` on the root movie.
    pub fn add_export(&self, name: &str, id: CharacterId) {
        write_lock(&self.movie.info).exports.insert(name.to_string(), id);
    }

    /// Tables from the JPEGTables tag.
    pub fn jpeg_tables(&self) -> Option<Arc<Vec<u8>>> {
        self.movie.jpeg_tables()
    }

    /// Stores the JPEGTables tag. Only the first is kept.
    pub fn set_jpeg_tables(&self, tables: Vec<u8>) {
        let mut info = write_lock(&self.movie.info);
        if info.jpeg_tables.is_some() {
            malformed!("More than one JPEGTables tag, keeping the first");
            return;
        }
        info.jpeg_tables = Some(Arc::new(tables));
    }

    /// Stores the SetBackgroundColor colour.
    pub fn set_background_color(&self, color: Rgba) {
        write_lock(&self.movie.info).background_color = Some(color);
    }

    /// Stores the FileAttributes flags.
    pub fn set_file_attributes(&self, attributes: FileAttributes) {
        write_lock(&self.movie.info).file_attributes = Some(attributes);
    }

    /// Stores the Metadata tag.
    pub fn set_metadata(&self, metadata: String) {
        write_lock(&self.movie.info).metadata = Some(metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{capture_logs, empty_shape, swf_file, tag, BitWriter};

    fn load(tags: &[Vec<u8>]) -> MovieDefinition {
        let bytes = swf_file(8, 2, tags);
        MovieDefinition::load(&bytes[..], LoaderServices::default(), LoaderOptions::default()).unwrap()
    }

    #[test]
    fn redefinition_keeps_the_newest() {
        let dictionary = Dictionary::new();
        let (_, logs) = capture_logs(|| {
            dictionary.define(CharacterId(1), Character::Sound(SoundSample { handler_id: 1 }));
            dictionary.define(CharacterId(1), Character::Sound(SoundSample { handler_id: 2 }));
        });
        assert_eq!(logs.malformed(), 1);
        assert_eq!(dictionary.get_sound_sample(CharacterId(1)).unwrap().handler_id, 2);
        assert_eq!(dictionary.len(), 1);
    }

    #[test]
    fn replace_needs_an_existing_entry() {
        let dictionary = Dictionary::new();
        assert!(!dictionary.replace(CharacterId(3), Character::Sound(SoundSample { handler_id: 1 })));
        assert!(dictionary.is_empty());
    }

    #[test]
    fn typed_lookups_check_the_kind() {
        let movie = load(&[empty_shape(4)]);
        let dictionary = movie.dictionary();
        assert_eq!(dictionary.get(CharacterId(4)).unwrap().kind(), CharacterKind::Shape);
        assert!(dictionary.get_font(CharacterId(4)).is_none());
        assert!(dictionary.get(CharacterId(5)).is_none());
        assert_eq!(dictionary.ids(), vec![CharacterId(4)]);
    }

    #[test]
    fn frames_and_labels() {
        let mut label = BitWriter::new();
        label.string("second");
        let movie = load(&[tag(1, &[]), tag(43, &label.into_bytes()), tag(1, &[])]);
        assert_eq!(movie.get_frame_count(), 2);
        assert_eq!(movie.get_loading_frame(), 2);
        assert_eq!(movie.timeline().frame_number("second"), Some(1));
        assert!(movie.is_load_complete());
    }

    #[test]
    fn sprites_get_their_own_namespace() {
        let mut sprite = BitWriter::new();
        sprite.u16(10).u16(1);
        sprite.bytes(&empty_shape(2));
        sprite.bytes(&tag(1, &[]));
        sprite.bytes(&tag(0, &[]));
        let movie = load(&[empty_shape(1), tag(39, &sprite.into_bytes())]);

        let sprite = movie.dictionary().get_sprite(CharacterId(10)).unwrap();
        assert_eq!(sprite.get_frame_count(), 1);
        assert_eq!(sprite.timeline().loaded_frames(), 1);
        assert!(sprite.dictionary().get(CharacterId(2)).is_some());
        assert!(movie.dictionary().get(CharacterId(2)).is_none());
        assert_eq!(movie.get_loading_frame(), 0);
    }

    #[test]
    fn exports_and_movie_attributes() {
        let mut export = BitWriter::new();
        export.u16(1).u16(1).string("Box");
        let mut metadata = BitWriter::new();
        metadata.string("<rdf/>");
        let movie = load(&[
            tag(69, &[0x19, 0, 0, 0]),
            tag(77, &metadata.into_bytes()),
            tag(9, &[10, 20, 30]),
            empty_shape(1),
            tag(56, &export.into_bytes()),
        ]);

        let attributes = movie.file_attributes().unwrap();
        assert!(attributes.has_metadata && attributes.action_script3 && attributes.use_network);
        assert!(!attributes.use_gpu);
        assert_eq!(movie.metadata().as_deref(), Some("<rdf/>"));
        assert_eq!(movie.background_color(), Some(Rgba::new(10, 20, 30, 255)));
        assert_eq!(movie.exports(), vec![("Box".to_string(), CharacterId(1))]);
        assert_eq!(
            movie.get_exported_resource("Box").map(|c| c.kind()),
            Some(CharacterKind::Shape)
        );
    }

    #[test]
    fn background_load_can_be_joined() {
        let tags: Vec<Vec<u8>> = (1..=20).map(empty_shape).collect();
        let bytes = swf_file(8, 1, &tags);
        let (movie, handle) =
            MovieDefinition::spawn_load(&bytes[..], LoaderServices::default(), LoaderOptions::default())
                .unwrap();
        handle.join().unwrap();
        assert!(movie.is_load_complete());
        assert_eq!(movie.dictionary().len(), 20);
    }

    #[test]
    fn cancelled_load_stops_between_tags() {
        let bytes = swf_file(8, 1, &[empty_shape(1), empty_shape(2)]);
        let (headers, body) = MovieDefinition::read_body(&bytes[..]).unwrap();
        let movie = MovieDefinition::new(headers, LoaderServices::default(), LoaderOptions::default());
        movie.cancel();
        movie.load_tags(&body);
        assert!(movie.dictionary().is_empty());
        assert!(movie.is_load_complete());
    }
}
