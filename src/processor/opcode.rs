//! The engine's action table.
//!
//! The position of a name in [`Opcode::NAMES`] *is* the opcode byte the
//! engine switches on, so new actions are only ever appended.

use super::binary::{DATA_ENDIAN, Endian, SCREEN_ENDIAN};
use super::resolve::OperandKind;

/// Every action record is this many bytes: opcode plus operand bytes.
pub const ACTION_SIZE: usize = 8;

/// One typed operand slot of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    /// JSON property the value is read from.
    pub name: &'static str,
    pub kind: OperandKind,
    pub width: usize,
    pub endian: Endian,
}

const fn op(name: &'static str, kind: OperandKind, width: usize) -> Operand {
    Operand {
        name,
        kind,
        width,
        endian: DATA_ENDIAN,
    }
}

const SUCCESS_SCRIPT: Operand = op("success_script", OperandKind::Script, 2);
const EXPECTED_SCRIPT: Operand = op("expected_script", OperandKind::Script, 2);
const SCRIPT: Operand = op("script", OperandKind::Script, 2);
const STRING: Operand = op("string", OperandKind::String, 2);
const ENTITY: Operand = op("entity", OperandKind::Entity, 1);
const TARGET_ENTITY: Operand = op("target_entity", OperandKind::Entity, 1);
const ENTITY_TYPE: Operand = op("entity_type", OperandKind::EntityType, 2);
const GEOMETRY: Operand = op("geometry", OperandKind::Geometry, 2);
const TARGET_GEOMETRY: Operand = op("target_geometry", OperandKind::Geometry, 2);
const MAP: Operand = op("map", OperandKind::Map, 2);
const DIALOG: Operand = op("dialog", OperandKind::Dialog, 2);
const SERIAL_DIALOG: Operand = op("serial_dialog", OperandKind::SerialDialog, 2);
const SAVE_FLAG: Operand = op("save_flag", OperandKind::SaveFlag, 2);
const VARIABLE: Operand = op("variable", OperandKind::Variable, 1);
const SOURCE: Operand = op("source", OperandKind::Variable, 1);
const EXPECTED_BOOL: Operand = op("expected_bool", OperandKind::Bool, 1);
const BOOL_VALUE: Operand = op("bool_value", OperandKind::Bool, 1);
const INBOUND: Operand = op("inbound", OperandKind::Bool, 1);
const EXPECTED_BYTE: Operand = op("expected_byte", OperandKind::Byte, 1);
const BYTE_VALUE: Operand = op("byte_value", OperandKind::Byte, 1);
const ANIMATION: Operand = op("animation", OperandKind::Byte, 1);
const PLAY_COUNT: Operand = op("play_count", OperandKind::Byte, 1);
const AMPLITUDE: Operand = op("amplitude", OperandKind::Byte, 1);
const SLOT: Operand = op("slot", OperandKind::Byte, 1);
const EXPECTED_U2: Operand = op("expected_u2", OperandKind::TwoBytes, 2);
const U2_VALUE: Operand = op("u2_value", OperandKind::TwoBytes, 2);
const ADDRESS: Operand = op("address", OperandKind::TwoBytes, 2);
const FREQUENCY: Operand = op("frequency", OperandKind::TwoBytes, 2);
const VALUE: Operand = op("value", OperandKind::TwoBytes, 2);
const EXPECTED_U4: Operand = op("expected_u4", OperandKind::Number, 4);
const U4_VALUE: Operand = op("u4_value", OperandKind::Number, 4);
const DURATION: Operand = op("duration", OperandKind::Number, 4);
const SHAKE_DURATION: Operand = op("duration", OperandKind::Number, 2);
const BUTTON_ID: Operand = op("button_id", OperandKind::Button, 1);
const DIRECTION: Operand = op("direction", OperandKind::Direction, 1);
const RELATIVE_DIRECTION: Operand = op("relative_direction", OperandKind::RelativeDirection, 1);
const FIELD: Operand = op("field", OperandKind::Field, 1);
const OPERATION: Operand = op("operation", OperandKind::Operation, 1);
const COMPARISON: Operand = op("comparison", OperandKind::Comparison, 1);
const ITEM_NAME: Operand = op("item_name", OperandKind::Item, 1);
const BLE_FLAG: Operand = op("ble_flag", OperandKind::BleFlag, 1);
const COLOR: Operand = Operand {
    endian: SCREEN_ENDIAN,
    ..op("color", OperandKind::Color, 2)
};

macro_rules! opcodes {
    ($($variant:ident = $name:literal [$($field:ident),*],)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($variant,)*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            /// Index == opcode byte.
            pub const NAMES: &'static [&'static str] = &[$($name,)*];

            /// Operand slots written after the opcode byte, in order.
            pub fn fields(self) -> &'static [Operand] {
                match self {
                    $(Opcode::$variant => &[$($field,)*],)*
                }
            }
        }
    };
}

opcodes! {
    NullAction = "NULL_ACTION" [],
    CheckEntityName = "CHECK_ENTITY_NAME" [SUCCESS_SCRIPT, STRING, ENTITY, EXPECTED_BOOL],
    CheckEntityX = "CHECK_ENTITY_X" [SUCCESS_SCRIPT, EXPECTED_U2, ENTITY, EXPECTED_BOOL],
    CheckEntityY = "CHECK_ENTITY_Y" [SUCCESS_SCRIPT, EXPECTED_U2, ENTITY, EXPECTED_BOOL],
    CheckEntityInteractScript = "CHECK_ENTITY_INTERACT_SCRIPT" [SUCCESS_SCRIPT, EXPECTED_SCRIPT, ENTITY, EXPECTED_BOOL],
    CheckEntityTickScript = "CHECK_ENTITY_TICK_SCRIPT" [SUCCESS_SCRIPT, EXPECTED_SCRIPT, ENTITY, EXPECTED_BOOL],
    CheckEntityType = "CHECK_ENTITY_TYPE" [SUCCESS_SCRIPT, ENTITY_TYPE, ENTITY, EXPECTED_BOOL],
    CheckEntityPrimaryId = "CHECK_ENTITY_PRIMARY_ID" [SUCCESS_SCRIPT, EXPECTED_U2, ENTITY, EXPECTED_BOOL],
    CheckEntitySecondaryId = "CHECK_ENTITY_SECONDARY_ID" [SUCCESS_SCRIPT, EXPECTED_U2, ENTITY, EXPECTED_BOOL],
    CheckEntityPrimaryIdType = "CHECK_ENTITY_PRIMARY_ID_TYPE" [SUCCESS_SCRIPT, ENTITY, EXPECTED_BYTE, EXPECTED_BOOL],
    CheckEntityCurrentAnimation = "CHECK_ENTITY_CURRENT_ANIMATION" [SUCCESS_SCRIPT, ENTITY, EXPECTED_BYTE, EXPECTED_BOOL],
    CheckEntityCurrentFrame = "CHECK_ENTITY_CURRENT_FRAME" [SUCCESS_SCRIPT, ENTITY, EXPECTED_BYTE, EXPECTED_BOOL],
    CheckEntityDirection = "CHECK_ENTITY_DIRECTION" [SUCCESS_SCRIPT, ENTITY, DIRECTION, EXPECTED_BOOL],
    CheckEntityGlitched = "CHECK_ENTITY_GLITCHED" [SUCCESS_SCRIPT, ENTITY, EXPECTED_BOOL],
    CheckEntityHackableStateA = "CHECK_ENTITY_HACKABLE_STATE_A" [SUCCESS_SCRIPT, ENTITY, EXPECTED_BYTE, EXPECTED_BOOL],
    CheckEntityHackableStateB = "CHECK_ENTITY_HACKABLE_STATE_B" [SUCCESS_SCRIPT, ENTITY, EXPECTED_BYTE, EXPECTED_BOOL],
    CheckEntityHackableStateC = "CHECK_ENTITY_HACKABLE_STATE_C" [SUCCESS_SCRIPT, ENTITY, EXPECTED_BYTE, EXPECTED_BOOL],
    CheckEntityHackableStateD = "CHECK_ENTITY_HACKABLE_STATE_D" [SUCCESS_SCRIPT, ENTITY, EXPECTED_BYTE, EXPECTED_BOOL],
    CheckEntityHackableStateAU2 = "CHECK_ENTITY_HACKABLE_STATE_A_U2" [SUCCESS_SCRIPT, EXPECTED_U2, ENTITY, EXPECTED_BOOL],
    CheckEntityHackableStateCU2 = "CHECK_ENTITY_HACKABLE_STATE_C_U2" [SUCCESS_SCRIPT, EXPECTED_U2, ENTITY, EXPECTED_BOOL],
    CheckEntityHackableStateAU4 = "CHECK_ENTITY_HACKABLE_STATE_A_U4" [EXPECTED_U4, SUCCESS_SCRIPT, ENTITY],
    CheckEntityPath = "CHECK_ENTITY_PATH" [SUCCESS_SCRIPT, GEOMETRY, ENTITY, EXPECTED_BOOL],
    CheckSaveFlag = "CHECK_SAVE_FLAG" [SUCCESS_SCRIPT, SAVE_FLAG, EXPECTED_BOOL],
    CheckIfEntityIsInGeometry = "CHECK_IF_ENTITY_IS_IN_GEOMETRY" [SUCCESS_SCRIPT, GEOMETRY, ENTITY, EXPECTED_BOOL],
    CheckForButtonPress = "CHECK_FOR_BUTTON_PRESS" [SUCCESS_SCRIPT, BUTTON_ID],
    CheckForButtonState = "CHECK_FOR_BUTTON_STATE" [SUCCESS_SCRIPT, BUTTON_ID, EXPECTED_BOOL],
    CheckWarpState = "CHECK_WARP_STATE" [SUCCESS_SCRIPT, STRING, EXPECTED_BOOL],
    RunScript = "RUN_SCRIPT" [SCRIPT],
    BlockingDelay = "BLOCKING_DELAY" [DURATION],
    NonBlockingDelay = "NON_BLOCKING_DELAY" [DURATION],
    SetEntityName = "SET_ENTITY_NAME" [STRING, ENTITY],
    SetEntityX = "SET_ENTITY_X" [U2_VALUE, ENTITY],
    SetEntityY = "SET_ENTITY_Y" [U2_VALUE, ENTITY],
    SetEntityInteractScript = "SET_ENTITY_INTERACT_SCRIPT" [SCRIPT, ENTITY],
    SetEntityTickScript = "SET_ENTITY_TICK_SCRIPT" [SCRIPT, ENTITY],
    SetEntityType = "SET_ENTITY_TYPE" [ENTITY_TYPE, ENTITY],
    SetEntityPrimaryId = "SET_ENTITY_PRIMARY_ID" [U2_VALUE, ENTITY],
    SetEntitySecondaryId = "SET_ENTITY_SECONDARY_ID" [U2_VALUE, ENTITY],
    SetEntityPrimaryIdType = "SET_ENTITY_PRIMARY_ID_TYPE" [BYTE_VALUE, ENTITY],
    SetEntityCurrentAnimation = "SET_ENTITY_CURRENT_ANIMATION" [BYTE_VALUE, ENTITY],
    SetEntityCurrentFrame = "SET_ENTITY_CURRENT_FRAME" [BYTE_VALUE, ENTITY],
    SetEntityDirection = "SET_ENTITY_DIRECTION" [DIRECTION, ENTITY],
    SetEntityDirectionRelative = "SET_ENTITY_DIRECTION_RELATIVE" [RELATIVE_DIRECTION, ENTITY],
    SetEntityDirectionTargetEntity = "SET_ENTITY_DIRECTION_TARGET_ENTITY" [TARGET_ENTITY, ENTITY],
    SetEntityDirectionTargetGeometry = "SET_ENTITY_DIRECTION_TARGET_GEOMETRY" [TARGET_GEOMETRY, ENTITY],
    SetEntityGlitched = "SET_ENTITY_GLITCHED" [ENTITY, BOOL_VALUE],
    SetEntityHackableStateA = "SET_ENTITY_HACKABLE_STATE_A" [BYTE_VALUE, ENTITY],
    SetEntityHackableStateB = "SET_ENTITY_HACKABLE_STATE_B" [BYTE_VALUE, ENTITY],
    SetEntityHackableStateC = "SET_ENTITY_HACKABLE_STATE_C" [BYTE_VALUE, ENTITY],
    SetEntityHackableStateD = "SET_ENTITY_HACKABLE_STATE_D" [BYTE_VALUE, ENTITY],
    SetEntityHackableStateAU2 = "SET_ENTITY_HACKABLE_STATE_A_U2" [U2_VALUE, ENTITY],
    SetEntityHackableStateCU2 = "SET_ENTITY_HACKABLE_STATE_C_U2" [U2_VALUE, ENTITY],
    SetEntityHackableStateAU4 = "SET_ENTITY_HACKABLE_STATE_A_U4" [U4_VALUE, ENTITY],
    SetEntityPath = "SET_ENTITY_PATH" [GEOMETRY, ENTITY],
    SetSaveFlag = "SET_SAVE_FLAG" [SAVE_FLAG, BOOL_VALUE],
    SetPlayerControl = "SET_PLAYER_CONTROL" [BOOL_VALUE],
    SetMapTickScript = "SET_MAP_TICK_SCRIPT" [SCRIPT],
    SetHexCursorLocation = "SET_HEX_CURSOR_LOCATION" [ADDRESS],
    SetWarpState = "SET_WARP_STATE" [STRING],
    SetHexEditorState = "SET_HEX_EDITOR_STATE" [BOOL_VALUE],
    SetHexEditorDialogMode = "SET_HEX_EDITOR_DIALOG_MODE" [BOOL_VALUE],
    SetHexEditorControl = "SET_HEX_EDITOR_CONTROL" [BOOL_VALUE],
    SetHexEditorControlClipboard = "SET_HEX_EDITOR_CONTROL_CLIPBOARD" [BOOL_VALUE],
    LoadMap = "LOAD_MAP" [MAP],
    ShowDialog = "SHOW_DIALOG" [DIALOG],
    PlayEntityAnimation = "PLAY_ENTITY_ANIMATION" [ENTITY, ANIMATION, PLAY_COUNT],
    TeleportEntityToGeometry = "TELEPORT_ENTITY_TO_GEOMETRY" [GEOMETRY, ENTITY],
    WalkEntityToGeometry = "WALK_ENTITY_TO_GEOMETRY" [DURATION, GEOMETRY, ENTITY],
    WalkEntityAlongGeometry = "WALK_ENTITY_ALONG_GEOMETRY" [DURATION, GEOMETRY, ENTITY],
    LoopEntityAlongGeometry = "LOOP_ENTITY_ALONG_GEOMETRY" [DURATION, GEOMETRY, ENTITY],
    SetCameraToFollowEntity = "SET_CAMERA_TO_FOLLOW_ENTITY" [ENTITY],
    TeleportCameraToGeometry = "TELEPORT_CAMERA_TO_GEOMETRY" [GEOMETRY],
    PanCameraToEntity = "PAN_CAMERA_TO_ENTITY" [DURATION, ENTITY],
    PanCameraToGeometry = "PAN_CAMERA_TO_GEOMETRY" [DURATION, GEOMETRY],
    PanCameraAlongGeometry = "PAN_CAMERA_ALONG_GEOMETRY" [DURATION, GEOMETRY, ENTITY],
    LoopCameraAlongGeometry = "LOOP_CAMERA_ALONG_GEOMETRY" [DURATION, GEOMETRY, ENTITY],
    SetScreenShake = "SET_SCREEN_SHAKE" [SHAKE_DURATION, FREQUENCY, AMPLITUDE],
    ScreenFadeOut = "SCREEN_FADE_OUT" [DURATION, COLOR],
    ScreenFadeIn = "SCREEN_FADE_IN" [DURATION, COLOR],
    MutateVariable = "MUTATE_VARIABLE" [VALUE, VARIABLE, OPERATION],
    MutateVariables = "MUTATE_VARIABLES" [VARIABLE, SOURCE, OPERATION],
    CopyVariable = "COPY_VARIABLE" [VARIABLE, ENTITY, FIELD, INBOUND],
    CheckVariable = "CHECK_VARIABLE" [SUCCESS_SCRIPT, VALUE, VARIABLE, COMPARISON, EXPECTED_BOOL],
    CheckVariables = "CHECK_VARIABLES" [SUCCESS_SCRIPT, VARIABLE, SOURCE, COMPARISON, EXPECTED_BOOL],
    SlotSave = "SLOT_SAVE" [],
    SlotLoad = "SLOT_LOAD" [SLOT],
    SlotErase = "SLOT_ERASE" [SLOT],
    SetConnectSerialDialog = "SET_CONNECT_SERIAL_DIALOG" [SERIAL_DIALOG],
    ShowSerialDialog = "SHOW_SERIAL_DIALOG" [SERIAL_DIALOG],
    InventoryGet = "INVENTORY_GET" [ITEM_NAME],
    InventoryDrop = "INVENTORY_DROP" [ITEM_NAME],
    CheckInventory = "CHECK_INVENTORY" [SUCCESS_SCRIPT, ITEM_NAME, EXPECTED_BOOL],
    SetMapLookScript = "SET_MAP_LOOK_SCRIPT" [SCRIPT],
    SetEntityLookScript = "SET_ENTITY_LOOK_SCRIPT" [SCRIPT, ENTITY],
    SetTeleportEnabled = "SET_TELEPORT_ENABLED" [BOOL_VALUE],
    CheckMap = "CHECK_MAP" [SUCCESS_SCRIPT, MAP, EXPECTED_BOOL],
    SetBleFlag = "SET_BLE_FLAG" [BLE_FLAG, BOOL_VALUE],
    CheckBleFlag = "CHECK_BLE_FLAG" [SUCCESS_SCRIPT, BLE_FLAG, EXPECTED_BOOL],
}

/// Compile-time macro that splices another script in place. It never
/// reaches the encoder.
pub const COPY_SCRIPT: &str = "COPY_SCRIPT";

impl Opcode {
    pub fn from_name(name: &str) -> Option<Opcode> {
        Self::NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| Self::ALL[i])
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[self as usize]
    }

    pub fn byte(self) -> u8 {
        self as u8
    }
}
