pub mod stream_websocket;
