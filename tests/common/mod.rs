//! Shared helpers for the integration tests: tiny in-process servers
//! speaking just enough of the camera's wire formats.

#![allow(dead_code)]

/// XML metadata of a 2x2 ToF-Mini record
pub fn tof_mini_xml() -> String {
    r#"<SickRecord>
  <DataSets>
    <DataSetDepthMap>
      <FormatDescriptionDepthMap>
        <DataStream>
          <Width>2</Width>
          <Height>2</Height>
          <CameraToWorldTransform>
            <value>1</value><value>0</value><value>0</value><value>0</value>
            <value>0</value><value>1</value><value>0</value><value>0</value>
            <value>0</value><value>0</value><value>1</value><value>0</value>
            <value>0</value><value>0</value><value>0</value><value>1</value>
          </CameraToWorldTransform>
          <CameraMatrix>
            <FX>180.0</FX><FY>180.0</FY><CX>1.0</CX><CY>1.0</CY>
          </CameraMatrix>
          <CameraDistortionParams>
            <K1>0</K1><K2>0</K2><P1>0</P1><P2>0</P2><K3>0</K3>
          </CameraDistortionParams>
          <FocalToRayCross>0</FocalToRayCross>
          <Distance>uint16</Distance>
          <Intensity>uint16</Intensity>
          <Confidence>uint16</Confidence>
        </DataStream>
      </FormatDescriptionDepthMap>
    </DataSetDepthMap>
  </DataSets>
</SickRecord>"#
        .to_string()
}

/// Version-2 depth map dataset for a 2x2 frame
pub fn depth_binary(frame_number: u32, timestamp: u64) -> Vec<u8> {
    let num_pixels = 4usize;
    let length = 4 + 8 + 2 + 6 + num_pixels * 6 + 8;
    let mut buf = Vec::with_capacity(length);
    buf.extend_from_slice(&(length as u32).to_le_bytes());
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    buf.extend_from_slice(&frame_number.to_le_bytes());
    buf.push(0);
    buf.push(0);
    for i in 0..num_pixels {
        buf.extend_from_slice(&(100 + i as u16).to_le_bytes());
    }
    for i in 0..num_pixels {
        buf.extend_from_slice(&(200 + i as u16).to_le_bytes());
    }
    for i in 0..num_pixels {
        buf.extend_from_slice(&(300 + i as u16).to_le_bytes());
    }
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&(length as u32).to_le_bytes());
    buf
}

/// Complete blob package for a 2x2 ToF-Mini frame
pub fn blob_packet(frame_number: u32, change_counter: u32) -> Vec<u8> {
    let xml = tof_mini_xml();
    let binary = depth_binary(frame_number, 0);

    let mut segments = Vec::new();
    segments.extend_from_slice(&1u16.to_be_bytes()); // blob id
    segments.extend_from_slice(&3u16.to_be_bytes()); // segment count
    segments.extend_from_slice(&0u32.to_be_bytes());
    segments.extend_from_slice(&change_counter.to_be_bytes());
    segments.extend_from_slice(&(xml.len() as u32).to_be_bytes());
    segments.extend_from_slice(&change_counter.to_be_bytes());
    segments.extend_from_slice(&((xml.len() + binary.len()) as u32).to_be_bytes());
    segments.extend_from_slice(&change_counter.to_be_bytes());
    segments.extend_from_slice(xml.as_bytes());
    segments.extend_from_slice(&binary);

    let mut packet = vec![0x02, 0x02, 0x02, 0x02];
    packet.extend_from_slice(&((2 + 1 + segments.len()) as u32).to_be_bytes());
    packet.extend_from_slice(&0x0001u16.to_be_bytes());
    packet.push(0x62);
    packet.extend_from_slice(&segments);
    packet
}

/// Frame a CoLa-B reply (header, payload, checksum)
pub fn cola_b_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x02, 0x02, 0x02, 0x02];
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame.push(payload.iter().fold(0u8, |acc, &b| acc ^ b));
    frame
}

/// Read one CoLa-B request from a stream, returning its payload
pub fn read_cola_b_request(stream: &mut std::net::TcpStream) -> std::io::Result<Vec<u8>> {
    use std::io::Read;

    let mut run = 0;
    let mut byte = [0u8; 1];
    while run < 4 {
        stream.read_exact(&mut byte)?;
        if byte[0] == 0x02 {
            run += 1;
        } else {
            run = 0;
        }
    }

    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let length = u32::from_be_bytes(len_buf) as usize;

    let mut payload = vec![0u8; length + 1];
    stream.read_exact(&mut payload)?;
    payload.pop(); // checksum
    Ok(payload)
}
