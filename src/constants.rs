//! Event type, event code and input property constants, together with the
//! compile-time name tables behind [`name`](EventType::name) and
//! [`from_name`](EventType::from_name).

use crate::compat::{
    ABS_CNT, EV_CNT, FF_CNT, INPUT_PROP_CNT, KEY_CNT, LED_CNT, MSC_CNT, REL_CNT, SND_CNT, SW_CNT,
};

/// Event types supported by the device.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventType(pub u16);

evdev_enum!(
    EventType,
    /// A bookkeeping event. Usually not important to applications.
    EV_SYN = 0x00,
    /// A key changed state. A key, or button, is usually a momentary switch (in the circuit
    /// sense). It has two states: down, or up. There are events for when keys are pressed (become
    /// down) and released (become up). There are also "key repeats", where multiple events are
    /// sent while a key is down.
    EV_KEY = 0x01,
    /// Movement on a relative axis. There is no absolute coordinate frame, just the fact that
    /// there was a change of a certain amount of units. Used for things like mouse movement or
    /// scroll wheels.
    EV_REL = 0x02,
    /// Movement on an absolute axis. Used for things such as touch events and joysticks.
    EV_ABS = 0x03,
    /// Miscellaneous events that don't fall into other categories.
    EV_MSC = 0x04,
    /// Change in a switch value. Switches are boolean conditions and usually correspond to a
    /// toggle switch of some kind in hardware.
    EV_SW = 0x05,
    /// An LED was toggled.
    EV_LED = 0x11,
    /// A sound was made.
    EV_SND = 0x12,
    /// Metadata about key repeat configuration; there are no events of this type.
    EV_REP = 0x14,
    /// Force feedback effect codes.
    EV_FF = 0x15,
    EV_PWR = 0x16,
    /// A force feedback effect's state changed.
    EV_FF_STATUS = 0x17,
);
attribute_set_impl!(EventType, EV_CNT);

impl EventType {
    /// The highest valid code for this event type, or `None` for types
    /// without a code table (`EV_SYN` and `EV_PWR`, per the historical
    /// contract) and for unknown types.
    pub fn max_code(self) -> Option<u16> {
        match self {
            EventType::EV_KEY => Some(KeyCode::MAX),
            EventType::EV_REL => Some(RelativeAxisCode::MAX),
            EventType::EV_ABS => Some(AbsoluteAxisCode::MAX),
            EventType::EV_MSC => Some(MiscCode::MAX),
            EventType::EV_SW => Some(SwitchCode::MAX),
            EventType::EV_LED => Some(LedCode::MAX),
            EventType::EV_SND => Some(SoundCode::MAX),
            EventType::EV_REP => Some(RepeatCode::MAX),
            EventType::EV_FF => Some(FFEffectCode::MAX),
            EventType::EV_FF_STATUS => Some(0x01),
            _ => None,
        }
    }
}

/// Device properties (`INPUT_PROP_*` in the kernel headers).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropType(pub u16);

evdev_enum!(
    PropType,
    prefix "INPUT_PROP_",
    /// This input device needs a pointer ("cursor") for the user to know its state.
    POINTER = 0x00,
    /// "direct input devices", according to the header.
    DIRECT = 0x01,
    /// "has button(s) under pad", according to the header.
    BUTTONPAD = 0x02,
    /// Touch rectangle only: multiple touches are reported as their bounding rectangle, not
    /// individually.
    SEMI_MT = 0x03,
    /// "softbuttons at top of pad", according to the header.
    TOPBUTTONPAD = 0x04,
    /// Is a pointing stick ("nub" etc).
    POINTING_STICK = 0x05,
    /// Has an accelerometer.
    ACCELEROMETER = 0x06,
);
attribute_set_impl!(PropType, INPUT_PROP_CNT);

/// Codes of the `EV_SYN` bookkeeping type.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SynchronizationCode(pub u16);

evdev_enum!(
    SynchronizationCode,
    /// Terminates a packet of events that occurred at the same moment in time.
    SYN_REPORT = 0,
    SYN_CONFIG = 1,
    /// Separates the data of distinct contacts on protocol-A multitouch devices.
    SYN_MT_REPORT = 2,
    /// The kernel's event buffer overran and events were lost; the reader must resynchronize.
    SYN_DROPPED = 3,
);

/// Codes of the `EV_REL` type: relative axes.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativeAxisCode(pub u16);

evdev_enum!(
    RelativeAxisCode,
    REL_X = 0x00,
    REL_Y = 0x01,
    REL_Z = 0x02,
    REL_RX = 0x03,
    REL_RY = 0x04,
    REL_RZ = 0x05,
    REL_HWHEEL = 0x06,
    REL_DIAL = 0x07,
    REL_WHEEL = 0x08,
    REL_MISC = 0x09,
    REL_RESERVED = 0x0a,
    REL_WHEEL_HI_RES = 0x0b,
    REL_HWHEEL_HI_RES = 0x0c,
);
attribute_set_impl!(RelativeAxisCode, REL_CNT);

impl RelativeAxisCode {
    pub(crate) const MAX: u16 = 0x0f;
}

/// Codes of the `EV_ABS` type: absolute axes, including the multitouch range.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AbsoluteAxisCode(pub u16);

evdev_enum!(
    AbsoluteAxisCode,
    ABS_X = 0x00,
    ABS_Y = 0x01,
    ABS_Z = 0x02,
    ABS_RX = 0x03,
    ABS_RY = 0x04,
    ABS_RZ = 0x05,
    ABS_THROTTLE = 0x06,
    ABS_RUDDER = 0x07,
    ABS_WHEEL = 0x08,
    ABS_GAS = 0x09,
    ABS_BRAKE = 0x0a,
    ABS_HAT0X = 0x10,
    ABS_HAT0Y = 0x11,
    ABS_HAT1X = 0x12,
    ABS_HAT1Y = 0x13,
    ABS_HAT2X = 0x14,
    ABS_HAT2Y = 0x15,
    ABS_HAT3X = 0x16,
    ABS_HAT3Y = 0x17,
    ABS_PRESSURE = 0x18,
    ABS_DISTANCE = 0x19,
    ABS_TILT_X = 0x1a,
    ABS_TILT_Y = 0x1b,
    ABS_TOOL_WIDTH = 0x1c,
    ABS_VOLUME = 0x20,
    ABS_PROFILE = 0x21,
    ABS_MISC = 0x28,
    /// "MT slot being modified"
    ABS_MT_SLOT = 0x2f,
    /// "Major axis of touching ellipse"
    ABS_MT_TOUCH_MAJOR = 0x30,
    /// "Minor axis (omit if circular)"
    ABS_MT_TOUCH_MINOR = 0x31,
    /// "Major axis of approaching ellipse"
    ABS_MT_WIDTH_MAJOR = 0x32,
    /// "Minor axis (omit if circular)"
    ABS_MT_WIDTH_MINOR = 0x33,
    /// "Ellipse orientation"
    ABS_MT_ORIENTATION = 0x34,
    /// "Center X touch position"
    ABS_MT_POSITION_X = 0x35,
    /// "Center Y touch position"
    ABS_MT_POSITION_Y = 0x36,
    /// "Type of touching device"
    ABS_MT_TOOL_TYPE = 0x37,
    /// "Group a set of packets as a blob"
    ABS_MT_BLOB_ID = 0x38,
    /// "Unique ID of the initiated contact"
    ABS_MT_TRACKING_ID = 0x39,
    /// "Pressure on contact area"
    ABS_MT_PRESSURE = 0x3a,
    /// "Contact hover distance"
    ABS_MT_DISTANCE = 0x3b,
    /// "Center X tool position"
    ABS_MT_TOOL_X = 0x3c,
    /// "Center Y tool position"
    ABS_MT_TOOL_Y = 0x3d,
);
attribute_set_impl!(AbsoluteAxisCode, ABS_CNT);

impl AbsoluteAxisCode {
    pub(crate) const MAX: u16 = 0x3f;

    /// Whether this code belongs to the multitouch range (`ABS_MT_SLOT` and
    /// everything after it).
    pub fn is_multitouch(self) -> bool {
        self.0 >= Self::ABS_MT_SLOT.0 && self.0 <= Self::MAX
    }
}

/// Codes of the `EV_SW` type: toggle switches.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwitchCode(pub u16);

evdev_enum!(
    SwitchCode,
    /// "set = lid shut"
    SW_LID = 0x00,
    /// "set = tablet mode"
    SW_TABLET_MODE = 0x01,
    /// "set = inserted"
    SW_HEADPHONE_INSERT = 0x02,
    /// "rfkill master switch, type 'any'"
    SW_RFKILL_ALL = 0x03,
    /// "set = inserted"
    SW_MICROPHONE_INSERT = 0x04,
    /// "set = plugged into dock"
    SW_DOCK = 0x05,
    /// "set = inserted"
    SW_LINEOUT_INSERT = 0x06,
    /// "set = mechanical switch set"
    SW_JACK_PHYSICAL_INSERT = 0x07,
    /// "set = inserted"
    SW_VIDEOOUT_INSERT = 0x08,
    /// "set = lens covered"
    SW_CAMERA_LENS_COVER = 0x09,
    /// "set = keypad slide out"
    SW_KEYPAD_SLIDE = 0x0a,
    /// "set = front proximity sensor active"
    SW_FRONT_PROXIMITY = 0x0b,
    /// "set = rotate locked/disabled"
    SW_ROTATE_LOCK = 0x0c,
    /// "set = inserted"
    SW_LINEIN_INSERT = 0x0d,
    /// "set = device disabled"
    SW_MUTE_DEVICE = 0x0e,
    /// "set = pen inserted"
    SW_PEN_INSERTED = 0x0f,
    /// "set = cover closed"
    SW_MACHINE_COVER = 0x10,
);
attribute_set_impl!(SwitchCode, SW_CNT);

impl SwitchCode {
    pub(crate) const MAX: u16 = 0x10;
}

/// Codes of the `EV_LED` type: LEDs specified by USB HID.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LedCode(pub u16);

evdev_enum!(
    LedCode,
    LED_NUML = 0x00,
    LED_CAPSL = 0x01,
    LED_SCROLLL = 0x02,
    LED_COMPOSE = 0x03,
    LED_KANA = 0x04,
    /// "Stand-by"
    LED_SLEEP = 0x05,
    LED_SUSPEND = 0x06,
    LED_MUTE = 0x07,
    /// "Generic indicator"
    LED_MISC = 0x08,
    /// "Message waiting"
    LED_MAIL = 0x09,
    /// "External power connected"
    LED_CHARGING = 0x0a,
);
attribute_set_impl!(LedCode, LED_CNT);

impl LedCode {
    pub(crate) const MAX: u16 = 0x0f;
}

/// Codes of the `EV_MSC` type.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MiscCode(pub u16);

evdev_enum!(
    MiscCode,
    /// Serial number, only exported for tablets ("Transducer Serial Number")
    MSC_SERIAL = 0x00,
    /// Only used by the PowerMate driver, right now.
    MSC_PULSELED = 0x01,
    /// Completely unused.
    MSC_GESTURE = 0x02,
    /// "Raw" event, rarely used.
    MSC_RAW = 0x03,
    /// Key scancode
    MSC_SCAN = 0x04,
    MSC_TIMESTAMP = 0x05,
);
attribute_set_impl!(MiscCode, MSC_CNT);

impl MiscCode {
    pub(crate) const MAX: u16 = 0x07;
}

/// Codes of the `EV_SND` type.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SoundCode(pub u16);

evdev_enum!(
    SoundCode,
    SND_CLICK = 0x00,
    SND_BELL = 0x01,
    SND_TONE = 0x02,
);
attribute_set_impl!(SoundCode, SND_CNT);

impl SoundCode {
    pub(crate) const MAX: u16 = 0x07;
}

/// Codes of the `EV_REP` type: key repeat configuration.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepeatCode(pub u16);

evdev_enum!(
    RepeatCode,
    REP_DELAY = 0x00,
    REP_PERIOD = 0x01,
);

impl RepeatCode {
    pub(crate) const MAX: u16 = 0x01;
}

/// Codes of the `EV_FF` type: force feedback effects and control codes.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FFEffectCode(pub u16);

evdev_enum!(
    FFEffectCode,
    FF_RUMBLE = 0x50,
    FF_PERIODIC = 0x51,
    FF_CONSTANT = 0x52,
    FF_SPRING = 0x53,
    FF_FRICTION = 0x54,
    FF_DAMPER = 0x55,
    FF_INERTIA = 0x56,
    FF_RAMP = 0x57,
    FF_SQUARE = 0x58,
    FF_TRIANGLE = 0x59,
    FF_SINE = 0x5a,
    FF_SAW_UP = 0x5b,
    FF_SAW_DOWN = 0x5c,
    FF_CUSTOM = 0x5d,
    FF_GAIN = 0x60,
    FF_AUTOCENTER = 0x61,
);
attribute_set_impl!(FFEffectCode, FF_CNT);

impl FFEffectCode {
    pub(crate) const MAX: u16 = 0x7f;
}

/// Codes of the `EV_KEY` type: keys and buttons.
///
/// Aliased button names (`BTN_A`/`BTN_SOUTH` and friends) resolve by table
/// order: the canonical spelling is listed first for each value.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyCode(pub u16);

evdev_enum!(
    KeyCode,
    KEY_RESERVED = 0,
    KEY_ESC = 1,
    KEY_1 = 2,
    KEY_2 = 3,
    KEY_3 = 4,
    KEY_4 = 5,
    KEY_5 = 6,
    KEY_6 = 7,
    KEY_7 = 8,
    KEY_8 = 9,
    KEY_9 = 10,
    KEY_0 = 11,
    KEY_MINUS = 12,
    KEY_EQUAL = 13,
    KEY_BACKSPACE = 14,
    KEY_TAB = 15,
    KEY_Q = 16,
    KEY_W = 17,
    KEY_E = 18,
    KEY_R = 19,
    KEY_T = 20,
    KEY_Y = 21,
    KEY_U = 22,
    KEY_I = 23,
    KEY_O = 24,
    KEY_P = 25,
    KEY_LEFTBRACE = 26,
    KEY_RIGHTBRACE = 27,
    KEY_ENTER = 28,
    KEY_LEFTCTRL = 29,
    KEY_A = 30,
    KEY_S = 31,
    KEY_D = 32,
    KEY_F = 33,
    KEY_G = 34,
    KEY_H = 35,
    KEY_J = 36,
    KEY_K = 37,
    KEY_L = 38,
    KEY_SEMICOLON = 39,
    KEY_APOSTROPHE = 40,
    KEY_GRAVE = 41,
    KEY_LEFTSHIFT = 42,
    KEY_BACKSLASH = 43,
    KEY_Z = 44,
    KEY_X = 45,
    KEY_C = 46,
    KEY_V = 47,
    KEY_B = 48,
    KEY_N = 49,
    KEY_M = 50,
    KEY_COMMA = 51,
    KEY_DOT = 52,
    KEY_SLASH = 53,
    KEY_RIGHTSHIFT = 54,
    KEY_KPASTERISK = 55,
    KEY_LEFTALT = 56,
    KEY_SPACE = 57,
    KEY_CAPSLOCK = 58,
    KEY_F1 = 59,
    KEY_F2 = 60,
    KEY_F3 = 61,
    KEY_F4 = 62,
    KEY_F5 = 63,
    KEY_F6 = 64,
    KEY_F7 = 65,
    KEY_F8 = 66,
    KEY_F9 = 67,
    KEY_F10 = 68,
    KEY_NUMLOCK = 69,
    KEY_SCROLLLOCK = 70,
    KEY_KP7 = 71,
    KEY_KP8 = 72,
    KEY_KP9 = 73,
    KEY_KPMINUS = 74,
    KEY_KP4 = 75,
    KEY_KP5 = 76,
    KEY_KP6 = 77,
    KEY_KPPLUS = 78,
    KEY_KP1 = 79,
    KEY_KP2 = 80,
    KEY_KP3 = 81,
    KEY_KP0 = 82,
    KEY_KPDOT = 83,
    KEY_ZENKAKUHANKAKU = 85,
    KEY_102ND = 86,
    KEY_F11 = 87,
    KEY_F12 = 88,
    KEY_RO = 89,
    KEY_KATAKANA = 90,
    KEY_HIRAGANA = 91,
    KEY_HENKAN = 92,
    KEY_KATAKANAHIRAGANA = 93,
    KEY_MUHENKAN = 94,
    KEY_KPJPCOMMA = 95,
    KEY_KPENTER = 96,
    KEY_RIGHTCTRL = 97,
    KEY_KPSLASH = 98,
    KEY_SYSRQ = 99,
    KEY_RIGHTALT = 100,
    KEY_LINEFEED = 101,
    KEY_HOME = 102,
    KEY_UP = 103,
    KEY_PAGEUP = 104,
    KEY_LEFT = 105,
    KEY_RIGHT = 106,
    KEY_END = 107,
    KEY_DOWN = 108,
    KEY_PAGEDOWN = 109,
    KEY_INSERT = 110,
    KEY_DELETE = 111,
    KEY_MACRO = 112,
    KEY_MUTE = 113,
    KEY_VOLUMEDOWN = 114,
    KEY_VOLUMEUP = 115,
    /// "SC System Power Down"
    KEY_POWER = 116,
    KEY_KPEQUAL = 117,
    KEY_KPPLUSMINUS = 118,
    KEY_PAUSE = 119,
    /// "AL Compiz Scale (Expose)"
    KEY_SCALE = 120,
    KEY_KPCOMMA = 121,
    KEY_HANGEUL = 122,
    KEY_HANGUEL = 122,
    KEY_HANJA = 123,
    KEY_YEN = 124,
    KEY_LEFTMETA = 125,
    KEY_RIGHTMETA = 126,
    KEY_COMPOSE = 127,
    /// "AC Stop"
    KEY_STOP = 128,
    KEY_AGAIN = 129,
    /// "AC Properties"
    KEY_PROPS = 130,
    /// "AC Undo"
    KEY_UNDO = 131,
    KEY_FRONT = 132,
    /// "AC Copy"
    KEY_COPY = 133,
    /// "AC Open"
    KEY_OPEN = 134,
    /// "AC Paste"
    KEY_PASTE = 135,
    /// "AC Search"
    KEY_FIND = 136,
    /// "AC Cut"
    KEY_CUT = 137,
    /// "AL Integrated Help Center"
    KEY_HELP = 138,
    /// "Menu (show menu)"
    KEY_MENU = 139,
    /// "AL Calculator"
    KEY_CALC = 140,
    KEY_SETUP = 141,
    /// "SC System Sleep"
    KEY_SLEEP = 142,
    /// "System Wake Up"
    KEY_WAKEUP = 143,
    /// "AL Local Machine Browser"
    KEY_FILE = 144,
    KEY_SENDFILE = 145,
    KEY_DELETEFILE = 146,
    KEY_XFER = 147,
    KEY_PROG1 = 148,
    KEY_PROG2 = 149,
    /// "AL Internet Browser"
    KEY_WWW = 150,
    KEY_MSDOS = 151,
    /// "AL Terminal Lock/Screensaver"
    KEY_COFFEE = 152,
    KEY_SCREENLOCK = 152,
    KEY_ROTATE_DISPLAY = 153,
    KEY_DIRECTION = 153,
    KEY_CYCLEWINDOWS = 154,
    KEY_MAIL = 155,
    /// "AC Bookmarks"
    KEY_BOOKMARKS = 156,
    KEY_COMPUTER = 157,
    /// "AC Back"
    KEY_BACK = 158,
    /// "AC Forward"
    KEY_FORWARD = 159,
    KEY_CLOSECD = 160,
    KEY_EJECTCD = 161,
    KEY_EJECTCLOSECD = 162,
    KEY_NEXTSONG = 163,
    KEY_PLAYPAUSE = 164,
    KEY_PREVIOUSSONG = 165,
    KEY_STOPCD = 166,
    KEY_RECORD = 167,
    KEY_REWIND = 168,
    /// "Media Select Telephone"
    KEY_PHONE = 169,
    KEY_ISO = 170,
    /// "AL Consumer Control Configuration"
    KEY_CONFIG = 171,
    /// "AC Home"
    KEY_HOMEPAGE = 172,
    /// "AC Refresh"
    KEY_REFRESH = 173,
    /// "AC Exit"
    KEY_EXIT = 174,
    KEY_MOVE = 175,
    KEY_EDIT = 176,
    KEY_SCROLLUP = 177,
    KEY_SCROLLDOWN = 178,
    KEY_KPLEFTPAREN = 179,
    KEY_KPRIGHTPAREN = 180,
    /// "AC New"
    KEY_NEW = 181,
    /// "AC Redo/Repeat"
    KEY_REDO = 182,
    KEY_F13 = 183,
    KEY_F14 = 184,
    KEY_F15 = 185,
    KEY_F16 = 186,
    KEY_F17 = 187,
    KEY_F18 = 188,
    KEY_F19 = 189,
    KEY_F20 = 190,
    KEY_F21 = 191,
    KEY_F22 = 192,
    KEY_F23 = 193,
    KEY_F24 = 194,
    KEY_PLAYCD = 200,
    KEY_PAUSECD = 201,
    KEY_PROG3 = 202,
    KEY_PROG4 = 203,
    /// "AL Dashboard"
    KEY_DASHBOARD = 204,
    KEY_SUSPEND = 205,
    /// "AC Close"
    KEY_CLOSE = 206,
    KEY_PLAY = 207,
    KEY_FASTFORWARD = 208,
    KEY_BASSBOOST = 209,
    /// "AC Print"
    KEY_PRINT = 210,
    KEY_HP = 211,
    KEY_CAMERA = 212,
    KEY_SOUND = 213,
    KEY_QUESTION = 214,
    KEY_EMAIL = 215,
    KEY_CHAT = 216,
    KEY_SEARCH = 217,
    KEY_CONNECT = 218,
    /// "AL Checkbook/Finance"
    KEY_FINANCE = 219,
    KEY_SPORT = 220,
    KEY_SHOP = 221,
    KEY_ALTERASE = 222,
    /// "AC Cancel"
    KEY_CANCEL = 223,
    KEY_BRIGHTNESSDOWN = 224,
    KEY_BRIGHTNESSUP = 225,
    KEY_MEDIA = 226,
    /// Cycle between available video outputs (Monitor/LCD/TV-out/etc)
    KEY_SWITCHVIDEOMODE = 227,
    KEY_KBDILLUMTOGGLE = 228,
    KEY_KBDILLUMDOWN = 229,
    KEY_KBDILLUMUP = 230,
    /// "AC Send"
    KEY_SEND = 231,
    /// "AC Reply"
    KEY_REPLY = 232,
    /// "AC Forward Msg"
    KEY_FORWARDMAIL = 233,
    /// "AC Save"
    KEY_SAVE = 234,
    KEY_DOCUMENTS = 235,
    KEY_BATTERY = 236,
    KEY_BLUETOOTH = 237,
    KEY_WLAN = 238,
    KEY_UWB = 239,
    KEY_UNKNOWN = 240,
    /// "drive next video source"
    KEY_VIDEO_NEXT = 241,
    /// "drive previous video source"
    KEY_VIDEO_PREV = 242,
    /// "brightness up, after max is min"
    KEY_BRIGHTNESS_CYCLE = 243,
    /// "Set Auto Brightness: manual brightness control is off, rely on ambient"
    KEY_BRIGHTNESS_AUTO = 244,
    KEY_BRIGHTNESS_ZERO = 244,
    /// "display device to off state"
    KEY_DISPLAY_OFF = 245,
    /// "Wireless WAN (LTE, UMTS, GSM, etc.)"
    KEY_WWAN = 246,
    KEY_WIMAX = 246,
    /// "Key that controls all radios"
    KEY_RFKILL = 247,
    /// "Mute / unmute the microphone"
    KEY_MICMUTE = 248,
    BTN_0 = 0x100,
    BTN_MISC = 0x100,
    BTN_1 = 0x101,
    BTN_2 = 0x102,
    BTN_3 = 0x103,
    BTN_4 = 0x104,
    BTN_5 = 0x105,
    BTN_6 = 0x106,
    BTN_7 = 0x107,
    BTN_8 = 0x108,
    BTN_9 = 0x109,
    BTN_LEFT = 0x110,
    BTN_MOUSE = 0x110,
    BTN_RIGHT = 0x111,
    BTN_MIDDLE = 0x112,
    BTN_SIDE = 0x113,
    BTN_EXTRA = 0x114,
    BTN_FORWARD = 0x115,
    BTN_BACK = 0x116,
    BTN_TASK = 0x117,
    BTN_TRIGGER = 0x120,
    BTN_JOYSTICK = 0x120,
    BTN_THUMB = 0x121,
    BTN_THUMB2 = 0x122,
    BTN_TOP = 0x123,
    BTN_TOP2 = 0x124,
    BTN_PINKIE = 0x125,
    BTN_BASE = 0x126,
    BTN_BASE2 = 0x127,
    BTN_BASE3 = 0x128,
    BTN_BASE4 = 0x129,
    BTN_BASE5 = 0x12a,
    BTN_BASE6 = 0x12b,
    BTN_DEAD = 0x12f,
    BTN_SOUTH = 0x130,
    BTN_A = 0x130,
    BTN_GAMEPAD = 0x130,
    BTN_EAST = 0x131,
    BTN_B = 0x131,
    BTN_C = 0x132,
    BTN_NORTH = 0x133,
    BTN_X = 0x133,
    BTN_WEST = 0x134,
    BTN_Y = 0x134,
    BTN_Z = 0x135,
    BTN_TL = 0x136,
    BTN_TR = 0x137,
    BTN_TL2 = 0x138,
    BTN_TR2 = 0x139,
    BTN_SELECT = 0x13a,
    BTN_START = 0x13b,
    BTN_MODE = 0x13c,
    BTN_THUMBL = 0x13d,
    BTN_THUMBR = 0x13e,
    BTN_TOOL_PEN = 0x140,
    BTN_DIGI = 0x140,
    BTN_TOOL_RUBBER = 0x141,
    BTN_TOOL_BRUSH = 0x142,
    BTN_TOOL_PENCIL = 0x143,
    BTN_TOOL_AIRBRUSH = 0x144,
    BTN_TOOL_FINGER = 0x145,
    BTN_TOOL_MOUSE = 0x146,
    BTN_TOOL_LENS = 0x147,
    /// "Five fingers on trackpad"
    BTN_TOOL_QUINTTAP = 0x148,
    BTN_STYLUS3 = 0x149,
    BTN_TOUCH = 0x14a,
    BTN_STYLUS = 0x14b,
    BTN_STYLUS2 = 0x14c,
    BTN_TOOL_DOUBLETAP = 0x14d,
    BTN_TOOL_TRIPLETAP = 0x14e,
    /// "Four fingers on trackpad"
    BTN_TOOL_QUADTAP = 0x14f,
    BTN_GEAR_DOWN = 0x150,
    BTN_WHEEL = 0x150,
    BTN_GEAR_UP = 0x151,
    KEY_OK = 0x160,
    KEY_SELECT = 0x161,
    KEY_GOTO = 0x162,
    KEY_CLEAR = 0x163,
    KEY_POWER2 = 0x164,
    KEY_OPTION = 0x165,
    /// "AL OEM Features/Tips/Tutorial"
    KEY_INFO = 0x166,
    KEY_TIME = 0x167,
    KEY_VENDOR = 0x168,
    KEY_ARCHIVE = 0x169,
    /// "Media Select Program Guide"
    KEY_PROGRAM = 0x16a,
    KEY_CHANNEL = 0x16b,
    KEY_FAVORITES = 0x16c,
    KEY_EPG = 0x16d,
    /// "Media Select Home"
    KEY_PVR = 0x16e,
    KEY_MHP = 0x16f,
    KEY_LANGUAGE = 0x170,
    KEY_TITLE = 0x171,
    KEY_SUBTITLE = 0x172,
    KEY_ANGLE = 0x173,
    KEY_ZOOM = 0x174,
    KEY_FULL_SCREEN = 0x174,
    KEY_MODE = 0x175,
    KEY_KEYBOARD = 0x176,
    KEY_SCREEN = 0x177,
    KEY_ASPECT_RATIO = 0x177,
    /// "Media Select Computer"
    KEY_PC = 0x178,
    /// "Media Select TV"
    KEY_TV = 0x179,
    /// "Media Select Cable"
    KEY_TV2 = 0x17a,
    /// "Media Select VCR"
    KEY_VCR = 0x17b,
    /// "VCR Plus"
    KEY_VCR2 = 0x17c,
    /// "Media Select Satellite"
    KEY_SAT = 0x17d,
    KEY_SAT2 = 0x17e,
    /// "Media Select CD"
    KEY_CD = 0x17f,
    /// "Media Select Tape"
    KEY_TAPE = 0x180,
    KEY_RADIO = 0x181,
    /// "Media Select Tuner"
    KEY_TUNER = 0x182,
    KEY_PLAYER = 0x183,
    KEY_TEXT = 0x184,
    /// "Media Select DVD"
    KEY_DVD = 0x185,
    KEY_AUX = 0x186,
    KEY_MP3 = 0x187,
    /// "AL Audio Browser"
    KEY_AUDIO = 0x188,
    /// "AL Movie Browser"
    KEY_VIDEO = 0x189,
    KEY_DIRECTORY = 0x18a,
    KEY_LIST = 0x18b,
    /// "Media Select Messages"
    KEY_MEMO = 0x18c,
    KEY_CALENDAR = 0x18d,
    KEY_RED = 0x18e,
    KEY_GREEN = 0x18f,
    KEY_YELLOW = 0x190,
    KEY_BLUE = 0x191,
    /// "Channel Increment"
    KEY_CHANNELUP = 0x192,
    /// "Channel Decrement"
    KEY_CHANNELDOWN = 0x193,
    KEY_FIRST = 0x194,
    /// "Recall Last"
    KEY_LAST = 0x195,
    KEY_AB = 0x196,
    KEY_NEXT = 0x197,
    KEY_RESTART = 0x198,
    KEY_SLOW = 0x199,
    KEY_SHUFFLE = 0x19a,
    KEY_BREAK = 0x19b,
    KEY_PREVIOUS = 0x19c,
    KEY_DIGITS = 0x19d,
    KEY_TEEN = 0x19e,
    KEY_TWEN = 0x19f,
    /// "Media Select Video Phone"
    KEY_VIDEOPHONE = 0x1a0,
    /// "Media Select Games"
    KEY_GAMES = 0x1a1,
    /// "AC Zoom In"
    KEY_ZOOMIN = 0x1a2,
    /// "AC Zoom Out"
    KEY_ZOOMOUT = 0x1a3,
    /// "AC Zoom"
    KEY_ZOOMRESET = 0x1a4,
    /// "AL Word Processor"
    KEY_WORDPROCESSOR = 0x1a5,
    /// "AL Text Editor"
    KEY_EDITOR = 0x1a6,
    /// "AL Spreadsheet"
    KEY_SPREADSHEET = 0x1a7,
    /// "AL Graphics Editor"
    KEY_GRAPHICSEDITOR = 0x1a8,
    /// "AL Presentation App"
    KEY_PRESENTATION = 0x1a9,
    /// "AL Database App"
    KEY_DATABASE = 0x1aa,
    /// "AL Newsreader"
    KEY_NEWS = 0x1ab,
    /// "AL Voicemail"
    KEY_VOICEMAIL = 0x1ac,
    /// "AL Contacts/Address Book"
    KEY_ADDRESSBOOK = 0x1ad,
    /// "AL Instant Messaging"
    KEY_MESSENGER = 0x1ae,
    /// "Turn display (LCD) on and off"
    KEY_DISPLAYTOGGLE = 0x1af,
    /// "AL Spell Check"
    KEY_SPELLCHECK = 0x1b0,
    /// "AL Logoff"
    KEY_LOGOFF = 0x1b1,
    KEY_DOLLAR = 0x1b2,
    KEY_EURO = 0x1b3,
    /// "Consumer - transport controls"
    KEY_FRAMEBACK = 0x1b4,
    KEY_FRAMEFORWARD = 0x1b5,
    /// "GenDesc - system context menu"
    KEY_CONTEXT_MENU = 0x1b6,
    /// "Consumer - transport control"
    KEY_MEDIA_REPEAT = 0x1b7,
    /// "10 channels up (10+)"
    KEY_10CHANNELSUP = 0x1b8,
    /// "10 channels down (10-)"
    KEY_10CHANNELSDOWN = 0x1b9,
    /// "AL Image Browser"
    KEY_IMAGES = 0x1ba,
    KEY_DEL_EOL = 0x1c0,
    KEY_DEL_EOS = 0x1c1,
    KEY_INS_LINE = 0x1c2,
    KEY_DEL_LINE = 0x1c3,
    KEY_FN = 0x1d0,
    KEY_FN_ESC = 0x1d1,
    KEY_FN_F1 = 0x1d2,
    KEY_FN_F2 = 0x1d3,
    KEY_FN_F3 = 0x1d4,
    KEY_FN_F4 = 0x1d5,
    KEY_FN_F5 = 0x1d6,
    KEY_FN_F6 = 0x1d7,
    KEY_FN_F7 = 0x1d8,
    KEY_FN_F8 = 0x1d9,
    KEY_FN_F9 = 0x1da,
    KEY_FN_F10 = 0x1db,
    KEY_FN_F11 = 0x1dc,
    KEY_FN_F12 = 0x1dd,
    KEY_FN_1 = 0x1de,
    KEY_FN_2 = 0x1df,
    KEY_FN_D = 0x1e0,
    KEY_FN_E = 0x1e1,
    KEY_FN_F = 0x1e2,
    KEY_FN_S = 0x1e3,
    KEY_FN_B = 0x1e4,
    KEY_BRL_DOT1 = 0x1f1,
    KEY_BRL_DOT2 = 0x1f2,
    KEY_BRL_DOT3 = 0x1f3,
    KEY_BRL_DOT4 = 0x1f4,
    KEY_BRL_DOT5 = 0x1f5,
    KEY_BRL_DOT6 = 0x1f6,
    KEY_BRL_DOT7 = 0x1f7,
    KEY_BRL_DOT8 = 0x1f8,
    KEY_BRL_DOT9 = 0x1f9,
    KEY_BRL_DOT10 = 0x1fa,
    /// "used by phones, remote controls,"
    KEY_NUMERIC_0 = 0x200,
    /// "and other keypads"
    KEY_NUMERIC_1 = 0x201,
    KEY_NUMERIC_2 = 0x202,
    KEY_NUMERIC_3 = 0x203,
    KEY_NUMERIC_4 = 0x204,
    KEY_NUMERIC_5 = 0x205,
    KEY_NUMERIC_6 = 0x206,
    KEY_NUMERIC_7 = 0x207,
    KEY_NUMERIC_8 = 0x208,
    KEY_NUMERIC_9 = 0x209,
    KEY_NUMERIC_STAR = 0x20a,
    KEY_NUMERIC_POUND = 0x20b,
    KEY_CAMERA_FOCUS = 0x210,
    /// "WiFi Protected Setup key"
    KEY_WPS_BUTTON = 0x211,
    /// "Request switch touchpad on or off"
    KEY_TOUCHPAD_TOGGLE = 0x212,
    KEY_TOUCHPAD_ON = 0x213,
    KEY_TOUCHPAD_OFF = 0x214,
    KEY_CAMERA_ZOOMIN = 0x215,
    KEY_CAMERA_ZOOMOUT = 0x216,
    KEY_CAMERA_UP = 0x217,
    KEY_CAMERA_DOWN = 0x218,
    KEY_CAMERA_LEFT = 0x219,
    KEY_CAMERA_RIGHT = 0x21a,
    KEY_ATTENDANT_ON = 0x21b,
    KEY_ATTENDANT_OFF = 0x21c,
    /// "Attendant call on or off"
    KEY_ATTENDANT_TOGGLE = 0x21d,
    /// "Reading light on or off"
    KEY_LIGHTS_TOGGLE = 0x21e,
    BTN_DPAD_UP = 0x220,
    BTN_DPAD_DOWN = 0x221,
    BTN_DPAD_LEFT = 0x222,
    BTN_DPAD_RIGHT = 0x223,
    /// "Ambient light sensor"
    KEY_ALS_TOGGLE = 0x230,
    /// "AL Button Configuration"
    KEY_BUTTONCONFIG = 0x240,
    /// "AL Task/Project Manager"
    KEY_TASKMANAGER = 0x241,
    /// "AL Log/Journal/Timecard"
    KEY_JOURNAL = 0x242,
    /// "AL Control Panel"
    KEY_CONTROLPANEL = 0x243,
    /// "AL Select Task/Application"
    KEY_APPSELECT = 0x244,
    /// "AL Screen Saver"
    KEY_SCREENSAVER = 0x245,
    /// "Listening Voice Command"
    KEY_VOICECOMMAND = 0x246,
    /// "Set Brightness to Minimum"
    KEY_BRIGHTNESS_MIN = 0x250,
    /// "Set Brightness to Maximum"
    KEY_BRIGHTNESS_MAX = 0x251,
    KEY_KBDINPUTASSIST_PREV = 0x260,
    KEY_KBDINPUTASSIST_NEXT = 0x261,
    KEY_KBDINPUTASSIST_PREVGROUP = 0x262,
    KEY_KBDINPUTASSIST_NEXTGROUP = 0x263,
    KEY_KBDINPUTASSIST_ACCEPT = 0x264,
    KEY_KBDINPUTASSIST_CANCEL = 0x265,
    BTN_TRIGGER_HAPPY1 = 0x2c0,
    BTN_TRIGGER_HAPPY = 0x2c0,
    BTN_TRIGGER_HAPPY2 = 0x2c1,
    BTN_TRIGGER_HAPPY3 = 0x2c2,
    BTN_TRIGGER_HAPPY4 = 0x2c3,
    BTN_TRIGGER_HAPPY5 = 0x2c4,
    BTN_TRIGGER_HAPPY6 = 0x2c5,
    BTN_TRIGGER_HAPPY7 = 0x2c6,
    BTN_TRIGGER_HAPPY8 = 0x2c7,
    BTN_TRIGGER_HAPPY9 = 0x2c8,
    BTN_TRIGGER_HAPPY10 = 0x2c9,
    BTN_TRIGGER_HAPPY11 = 0x2ca,
    BTN_TRIGGER_HAPPY12 = 0x2cb,
    BTN_TRIGGER_HAPPY13 = 0x2cc,
    BTN_TRIGGER_HAPPY14 = 0x2cd,
    BTN_TRIGGER_HAPPY15 = 0x2ce,
    BTN_TRIGGER_HAPPY16 = 0x2cf,
    BTN_TRIGGER_HAPPY17 = 0x2d0,
    BTN_TRIGGER_HAPPY18 = 0x2d1,
    BTN_TRIGGER_HAPPY19 = 0x2d2,
    BTN_TRIGGER_HAPPY20 = 0x2d3,
    BTN_TRIGGER_HAPPY21 = 0x2d4,
    BTN_TRIGGER_HAPPY22 = 0x2d5,
    BTN_TRIGGER_HAPPY23 = 0x2d6,
    BTN_TRIGGER_HAPPY24 = 0x2d7,
    BTN_TRIGGER_HAPPY25 = 0x2d8,
    BTN_TRIGGER_HAPPY26 = 0x2d9,
    BTN_TRIGGER_HAPPY27 = 0x2da,
    BTN_TRIGGER_HAPPY28 = 0x2db,
    BTN_TRIGGER_HAPPY29 = 0x2dc,
    BTN_TRIGGER_HAPPY30 = 0x2dd,
    BTN_TRIGGER_HAPPY31 = 0x2de,
    BTN_TRIGGER_HAPPY32 = 0x2df,
    BTN_TRIGGER_HAPPY33 = 0x2e0,
    BTN_TRIGGER_HAPPY34 = 0x2e1,
    BTN_TRIGGER_HAPPY35 = 0x2e2,
    BTN_TRIGGER_HAPPY36 = 0x2e3,
    BTN_TRIGGER_HAPPY37 = 0x2e4,
    BTN_TRIGGER_HAPPY38 = 0x2e5,
    BTN_TRIGGER_HAPPY39 = 0x2e6,
    BTN_TRIGGER_HAPPY40 = 0x2e7,
);
attribute_set_impl!(KeyCode, KEY_CNT);

impl KeyCode {
    pub(crate) const MAX: u16 = 0x2ff;
}
