//! The closed set of DyNet opcode numbers and sync bytes.

/// First byte of every frame, classifying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncByte {
    /// Logical message (area/preset/channel traffic).
    Logical = 0x1C,
    /// Device-addressed message; not interpreted.
    Device = 0x5C,
    /// Debug message; bytes 1..=6 carry ASCII text.
    Debug = 0x6C,
}

impl SyncByte {
    pub fn from_u8(byte: u8) -> Option<SyncByte> {
        match byte {
            0x1C => Some(SyncByte::Logical),
            0x5C => Some(SyncByte::Device),
            0x6C => Some(SyncByte::Debug),
            _ => None,
        }
    }

    pub fn has_value(byte: u8) -> bool {
        SyncByte::from_u8(byte).is_some()
    }
}

/// Logical-frame opcodes.
///
/// The set is closed: numbers outside it decode to an UNHANDLED event
/// rather than an error. Only a subset is interpreted beyond naming
/// (see `inbound`); control-panel, occupancy, and area-link commands
/// are accepted for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Preset1 = 0,
    Preset2 = 1,
    Preset3 = 2,
    Preset4 = 3,
    RecallOff = 4,
    DecreaseLevel = 5,
    IncrementLevel = 6,
    ProgramOutCurrentPreset = 8,
    Preset5 = 10,
    Preset6 = 11,
    Preset7 = 12,
    Preset8 = 13,
    ResetToPreset = 15,
    Dmx = 16,
    PeControl = 17,
    AreaJoinLevel = 20,
    LockControlPanels = 21,
    EnableControlPanels = 22,
    Panic = 23,
    Unpanic = 24,
    SetAreaLink = 32,
    ClearAreaLink = 33,
    RequestAreaLinks = 35,
    OccupancyControl = 49,
    AreaJoinMask = 64,
    PanelLighting = 72,
    RequestAreaTemp = 73,
    RampAllChannels = 95,
    ReportChannelLevel = 96,
    RequestChannelLevel = 97,
    ReportPreset = 98,
    RequestPreset = 99,
    PresetOffset = 100,
    LinearPreset = 101,
    SaveCurrentPreset = 102,
    RestoreCurrentPreset = 103,
    TurnAllAreasOff = 104,
    TurnAllAreasOn = 105,
    FadeChannelAreaToPreset = 107,
    ToggleChannelState = 112,
    StartFadingFast = 113,
    StartFadingMed = 114,
    StartFadingSlow = 115,
    StopFading = 118,
    StartFadingAll = 121,
    StopFadingAll = 122,
    ProgramTogglePreset = 125,
    SetChannel1ToLevelWithFade = 128,
    SetChannel2ToLevelWithFade = 129,
    SetChannel3ToLevelWithFade = 130,
    SetChannel4ToLevelWithFade = 131,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match value {
            0 => Preset1,
            1 => Preset2,
            2 => Preset3,
            3 => Preset4,
            4 => RecallOff,
            5 => DecreaseLevel,
            6 => IncrementLevel,
            8 => ProgramOutCurrentPreset,
            10 => Preset5,
            11 => Preset6,
            12 => Preset7,
            13 => Preset8,
            15 => ResetToPreset,
            16 => Dmx,
            17 => PeControl,
            20 => AreaJoinLevel,
            21 => LockControlPanels,
            22 => EnableControlPanels,
            23 => Panic,
            24 => Unpanic,
            32 => SetAreaLink,
            33 => ClearAreaLink,
            35 => RequestAreaLinks,
            49 => OccupancyControl,
            64 => AreaJoinMask,
            72 => PanelLighting,
            73 => RequestAreaTemp,
            95 => RampAllChannels,
            96 => ReportChannelLevel,
            97 => RequestChannelLevel,
            98 => ReportPreset,
            99 => RequestPreset,
            100 => PresetOffset,
            101 => LinearPreset,
            102 => SaveCurrentPreset,
            103 => RestoreCurrentPreset,
            104 => TurnAllAreasOff,
            105 => TurnAllAreasOn,
            107 => FadeChannelAreaToPreset,
            112 => ToggleChannelState,
            113 => StartFadingFast,
            114 => StartFadingMed,
            115 => StartFadingSlow,
            118 => StopFading,
            121 => StartFadingAll,
            122 => StopFadingAll,
            125 => ProgramTogglePreset,
            128 => SetChannel1ToLevelWithFade,
            129 => SetChannel2ToLevelWithFade,
            130 => SetChannel3ToLevelWithFade,
            131 => SetChannel4ToLevelWithFade,
            _ => return None,
        })
    }

    pub fn has_value(value: u8) -> bool {
        Opcode::from_u8(value).is_some()
    }

    pub fn name_of(value: u8) -> Option<&'static str> {
        Opcode::from_u8(value).map(Opcode::name)
    }

    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Preset1 => "PRESET_1",
            Preset2 => "PRESET_2",
            Preset3 => "PRESET_3",
            Preset4 => "PRESET_4",
            RecallOff => "RECALL_OFF",
            DecreaseLevel => "DECREASE_LEVEL",
            IncrementLevel => "INCREMENT_LEVEL",
            ProgramOutCurrentPreset => "PROGRAM_OUT_CURRENT_PRESET",
            Preset5 => "PRESET_5",
            Preset6 => "PRESET_6",
            Preset7 => "PRESET_7",
            Preset8 => "PRESET_8",
            ResetToPreset => "RESET_TO_PRESET",
            Dmx => "DMX",
            PeControl => "PE_CONTROL",
            AreaJoinLevel => "AREA_JOIN_LEVEL",
            LockControlPanels => "LOCK_CONTROL_PANELS",
            EnableControlPanels => "ENABLE_CONTROL_PANELS",
            Panic => "PANIC",
            Unpanic => "UNPANIC",
            SetAreaLink => "SET_AREA_LINK",
            ClearAreaLink => "CLEAR_AREA_LINK",
            RequestAreaLinks => "REQUEST_AREA_LINKS",
            OccupancyControl => "OCCUPANCY_CONTROL",
            AreaJoinMask => "AREA_JOIN_MASK",
            PanelLighting => "PANEL_LIGHTING",
            RequestAreaTemp => "REQUEST_AREA_TEMP",
            RampAllChannels => "RAMP_ALL_CHANNELS",
            ReportChannelLevel => "REPORT_CHANNEL_LEVEL",
            RequestChannelLevel => "REQUEST_CHANNEL_LEVEL",
            ReportPreset => "REPORT_PRESET",
            RequestPreset => "REQUEST_PRESET",
            PresetOffset => "PRESET_OFFSET",
            LinearPreset => "LINEAR_PRESET",
            SaveCurrentPreset => "SAVE_CURRENT_PRESET",
            RestoreCurrentPreset => "RESTORE_CURRENT_PRESET",
            TurnAllAreasOff => "TURN_ALL_AREAS_OFF",
            TurnAllAreasOn => "TURN_ALL_AREAS_ON",
            FadeChannelAreaToPreset => "FADE_CHANNEL_AREA_TO_PRESET",
            ToggleChannelState => "TOGGLE_CHANNEL_STATE",
            StartFadingFast => "START_FADING_FAST",
            StartFadingMed => "START_FADING_MED",
            StartFadingSlow => "START_FADING_SLOW",
            StopFading => "STOP_FADING",
            StartFadingAll => "START_FADING_ALL",
            StopFadingAll => "STOP_FADING_ALL",
            ProgramTogglePreset => "PROGRAM_TOGGLE_PRESET",
            SetChannel1ToLevelWithFade => "SET_CHANNEL_1_TO_LEVEL_WITH_FADE",
            SetChannel2ToLevelWithFade => "SET_CHANNEL_2_TO_LEVEL_WITH_FADE",
            SetChannel3ToLevelWithFade => "SET_CHANNEL_3_TO_LEVEL_WITH_FADE",
            SetChannel4ToLevelWithFade => "SET_CHANNEL_4_TO_LEVEL_WITH_FADE",
        }
    }

    /// Queries gated by the connection's active mode.
    pub fn is_state_query(self) -> bool {
        matches!(self, Opcode::RequestChannelLevel | Opcode::RequestPreset)
    }
}

/// Active-mode gating check on a raw command byte.
pub fn is_state_query(command: u8) -> bool {
    Opcode::from_u8(command).is_some_and(Opcode::is_state_query)
}
