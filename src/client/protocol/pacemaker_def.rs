pub const START_OF_HOST_FRAME: u8 = 0x23;
pub const START_OF_CLIENT_FRAME: u8 = 0x42;

pub const DEBUG_FLAG: u8 = 0x80;
pub const SEQUENCE_MASK: u8 = 0x0F;
pub const MAX_SEQUENCE_NUMBER: u8 = 15;

pub const POS_SYNC: usize = 0;
pub const POS_LENGTH: usize = 1;
pub const POS_CONTROL: usize = 2;
pub const POS_CODE: usize = 3;
pub const POS_PARAMETER0: usize = 4;

/// sync + length + control + code + crc
pub const FRAME_OVERHEAD: usize = 5;
pub const MIN_FRAME_LEN: usize = FRAME_OVERHEAD;
/// The length byte covers control, code and parameters.
pub const MAX_PARAMETER_LEN: usize = 255 - 2;
pub const MAX_FRAME_LEN: usize = 255 + 3;
pub const RX_BUFFER_LEN: usize = 512;

pub const ORDER_ONLY_FRAME_LEN: usize = 5;
pub const BYTE_FRAME_LEN: usize = 6;
pub const BYTE_U32_FRAME_LEN: usize = 10;

pub const ORDER_RESUME: u8 = 0x00;
pub const ORDER_REQ_INFORMATION: u8 = 0x01;
pub const ORDER_REQ_DEVICE_NAME: u8 = 0x02;
pub const ORDER_REQ_TEMPERATURE: u8 = 0x03;
pub const ORDER_GET_HEATER_CONFIGURATION: u8 = 0x04;
pub const ORDER_CONFIGURE_HEATER: u8 = 0x05;
pub const ORDER_SET_HEATER_TARGET_TEMPERATURE: u8 = 0x06;
pub const ORDER_REQ_INPUT: u8 = 0x07;
pub const ORDER_SET_OUTPUT: u8 = 0x08;
pub const ORDER_SET_PWM: u8 = 0x09;
pub const ORDER_WRITE_FIRMWARE_CONFIGURATION: u8 = 0x0A;
pub const ORDER_READ_FIRMWARE_CONFIGURATION: u8 = 0x0B;
pub const ORDER_STOP_PRINT: u8 = 0x0C;
pub const ORDER_ACTIVATE_STEPPER_CONTROL: u8 = 0x0D;
pub const ORDER_ENABLE_DISABLE_STEPPER_MOTORS: u8 = 0x0E;
pub const ORDER_CONFIGURE_END_STOPS: u8 = 0x0F;
pub const ORDER_ENABLE_DISABLE_END_STOPS: u8 = 0x10;
pub const ORDER_REQUEST_DEVICE_COUNT: u8 = 0x11;
pub const ORDER_QUEUE_COMMAND_BLOCKS: u8 = 0x12;
pub const ORDER_CONFIGURE_AXIS_MOVEMENT_RATES: u8 = 0x13;
pub const ORDER_RETRIEVE_EVENTS: u8 = 0x14;
pub const ORDER_GET_NUMBER_EVENT_FORMAT_IDS: u8 = 0x15;
pub const ORDER_GET_EVENT_STRING_FORMAT_ID: u8 = 0x16;
pub const ORDER_CLEAR_COMMAND_BLOCK_QUEUE: u8 = 0x17;
pub const ORDER_REQUEST_DEVICE_STATUS: u8 = 0x18;
pub const ORDER_CONFIGURE_MOVEMENT_UNDERRUN_AVOIDANCE_PARAMETERS: u8 = 0x19;
pub const ORDER_GET_FIRMWARE_CONFIGURATION_VALUE_PROPERTIES: u8 = 0x1A;
pub const ORDER_TRAVERSE_FIRMWARE_CONFIGURATION_VALUES: u8 = 0x1B;
pub const ORDER_RESET: u8 = 0x7F;

pub const RESPONSE_FRAME_RECEIPT_ERROR: u8 = 0x00;
pub const RESPONSE_OK: u8 = 0x10;
pub const RESPONSE_GENERIC_APPLICATION_ERROR: u8 = 0x11;
pub const RESPONSE_STOPPED: u8 = 0x12;
pub const RESPONSE_ORDER_SPECIFIC_ERROR: u8 = 0x13;
pub const RESPONSE_DEBUG_FRAME_DEBUG_MESSAGE: u8 = 0x50;
pub const RESPONSE_DEBUG_FRAME_NEW_EVENT: u8 = 0x51;

pub const RECEIPT_BAD_FRAME: u8 = 0;
pub const RECEIPT_BAD_ERROR_CHECK_CODE: u8 = 1;
pub const RECEIPT_UNABLE_TO_ACCEPT_FRAME: u8 = 2;

pub const ERR_UNKNOWN_ORDER: u8 = 1;
pub const ERR_BAD_PARAMETER_FORMAT: u8 = 2;
pub const ERR_BAD_PARAMETER_VALUE: u8 = 3;
pub const ERR_INVALID_DEVICE_TYPE: u8 = 4;
pub const ERR_INVALID_DEVICE_NUMBER: u8 = 5;
pub const ERR_INCORRECT_MODE: u8 = 6;
pub const ERR_BUSY: u8 = 7;
pub const ERR_FAILED: u8 = 8;
pub const ERR_FIRMWARE_ERROR: u8 = 9;
pub const ERR_CANNOT_ACTIVATE_DEVICE: u8 = 10;

pub const QUERY_STOPPED_STATE: u8 = 0;
pub const CLEAR_STOPPED_STATE: u8 = 1;

pub const RECOVERY_CLEARED: u8 = 1;
pub const RECOVERY_PERSISTS: u8 = 2;
pub const RECOVERY_UNRECOVERABLE: u8 = 3;

pub const CAUSE_RESET: u8 = 0;
pub const CAUSE_END_STOP_HIT: u8 = 1;
pub const CAUSE_MOVEMENT_ERROR: u8 = 2;
pub const CAUSE_TEMPERATURE_ERROR: u8 = 3;
pub const CAUSE_DEVICE_FAULT: u8 = 4;
pub const CAUSE_ELECTRICAL_FAULT: u8 = 5;
pub const CAUSE_FIRMWARE_FAULT: u8 = 6;
pub const CAUSE_USER_REQUESTED: u8 = 7;
pub const CAUSE_HOST_TIMEOUT: u8 = 8;
pub const CAUSE_OTHER_FAULT: u8 = 9;

pub const DEVICE_TYPE_INPUT: u8 = 1;
pub const DEVICE_TYPE_OUTPUT: u8 = 2;
pub const DEVICE_TYPE_PWM_OUTPUT: u8 = 3;
pub const DEVICE_TYPE_STEPPER: u8 = 4;
pub const DEVICE_TYPE_HEATER: u8 = 5;
pub const DEVICE_TYPE_TEMPERATURE_SENSOR: u8 = 6;
pub const DEVICE_TYPE_BUZZER: u8 = 7;

pub const EXTENSION_STEPPER_CONTROL: u8 = 0;
pub const EXTENSION_QUEUED_COMMAND: u8 = 1;
pub const EXTENSION_BASIC_MOVE: u8 = 2;
pub const EXTENSION_EVENT_REPORTING: u8 = 3;

pub const MOVEMENT_BLOCK_TYPE_COMMAND_WRAPPER: u8 = 0x01;
pub const MOVEMENT_BLOCK_TYPE_DELAY: u8 = 0x02;
pub const MOVEMENT_BLOCK_TYPE_BASIC_LINEAR_MOVE: u8 = 0x03;
pub const MOVEMENT_BLOCK_TYPE_SET_ACTIVE_TOOLHEAD: u8 = 0x04;

pub const BLOCK_HEADER_LEN: usize = 2;
pub const DELAY_TICK_MICROSECONDS: u32 = 10;

pub const DEFAULT_FIRST_BYTE_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_BYTE_TIMEOUT_MS: u64 = 20;
pub const DEFAULT_DEBUG_DEADLINE_MS: u64 = 2000;
