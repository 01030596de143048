//! Synthetic blobs for unit tests
//!
//! Builders for the XML metadata and binary datasets of tiny frames, plus
//! the framing wrappers, so protocol tests can feed byte-exact packages
//! without fixture files.

use crate::endian::push_be;

pub fn tof_mini_xml(width: usize, height: usize) -> String {
    format!(
        r#"<SickRecord>
  <DataSets>
    <DataSetDepthMap>
      <FormatDescriptionDepthMap>
        <DataStream>
          <Width>{width}</Width>
          <Height>{height}</Height>
          <CameraToWorldTransform>
            <value>1</value><value>0</value><value>0</value><value>10</value>
            <value>0</value><value>1</value><value>0</value><value>20</value>
            <value>0</value><value>0</value><value>1</value><value>30</value>
            <value>0</value><value>0</value><value>0</value><value>1</value>
          </CameraToWorldTransform>
          <CameraMatrix>
            <FX>180.0</FX><FY>180.0</FY><CX>{cx}</CX><CY>{cy}</CY>
          </CameraMatrix>
          <CameraDistortionParams>
            <K1>-0.1</K1><K2>0.01</K2><P1>0</P1><P2>0</P2><K3>0</K3>
          </CameraDistortionParams>
          <FocalToRayCross>2.7</FocalToRayCross>
          <Distance>uint16</Distance>
          <Intensity>uint16</Intensity>
          <Confidence>uint16</Confidence>
        </DataStream>
      </FormatDescriptionDepthMap>
    </DataSetDepthMap>
  </DataSets>
</SickRecord>"#,
        width = width,
        height = height,
        cx = width as f64 / 2.0,
        cy = height as f64 / 2.0,
    )
}

pub fn tof_xml(width: usize, height: usize, polar_beams: Option<u8>) -> String {
    let polar = match polar_beams {
        Some(beams) => format!(
            r#"<DataSetPolar2D>
      <FormatDescription>
        <DataStream datalength="{beams}"/>
      </FormatDescription>
    </DataSetPolar2D>"#
        ),
        None => String::new(),
    };
    format!(
        r#"<SickRecord>
  <DataSets>
    <DataSetDepthMap>
      <FormatDescriptionDepthMap>
        <DataStream>
          <Width>{width}</Width>
          <Height>{height}</Height>
          <CameraToWorldTransform>
            <value>1</value><value>0</value><value>0</value><value>0</value>
            <value>0</value><value>1</value><value>0</value><value>0</value>
            <value>0</value><value>0</value><value>1</value><value>0</value>
            <value>0</value><value>0</value><value>0</value><value>1</value>
          </CameraToWorldTransform>
          <CameraMatrix>
            <FX>146.5</FX><FY>146.5</FY><CX>{cx}</CX><CY>{cy}</CY>
          </CameraMatrix>
          <CameraDistortionParams>
            <K1>-0.25</K1><K2>0.06</K2><P1>0</P1><P2>0</P2><K3>0</K3>
          </CameraDistortionParams>
          <FocalToRayCross>8.6</FocalToRayCross>
          <Distance decimalexponent="-4">uint16</Distance>
          <Intensity>uint16</Intensity>
          <Confidence>uint16</Confidence>
        </DataStream>
      </FormatDescriptionDepthMap>
    </DataSetDepthMap>
    {polar}
  </DataSets>
</SickRecord>"#,
        width = width,
        height = height,
        cx = width as f64 / 2.0,
        cy = height as f64 / 2.0,
        polar = polar,
    )
}

pub fn stereo_xml(width: usize, height: usize) -> String {
    format!(
        r#"<SickRecord>
  <DataSets>
    <DataSetStereo>
      <FormatDescriptionDepthMap>
        <DataStream>
          <Width>{width}</Width>
          <Height>{height}</Height>
          <CameraToWorldTransform>
            <value>1</value><value>0</value><value>0</value><value>0</value>
            <value>0</value><value>1</value><value>0</value><value>0</value>
            <value>0</value><value>0</value><value>1</value><value>0</value>
            <value>0</value><value>0</value><value>0</value><value>1</value>
          </CameraToWorldTransform>
          <CameraMatrix>
            <FX>370.0</FX><FY>370.0</FY><CX>{cx}</CX><CY>{cy}</CY>
          </CameraMatrix>
          <CameraDistortionParams>
            <K1>0</K1><K2>0</K2><P1>0</P1><P2>0</P2><K3>0</K3>
          </CameraDistortionParams>
          <FocalToRayCross>0</FocalToRayCross>
          <Z decimalexponent="-1">uint16</Z>
          <Intensity>uint32</Intensity>
          <Confidence>uint16</Confidence>
        </DataStream>
      </FormatDescriptionDepthMap>
    </DataSetStereo>
  </DataSets>
</SickRecord>"#,
        width = width,
        height = height,
        cx = width as f64 / 2.0,
        cy = height as f64 / 2.0,
    )
}

/// Version-2 depth map dataset with u16 distance/intensity/confidence maps.
///
/// Distances count up from 100, intensities from 200, confidences from 300.
pub fn tof_depth_binary(num_pixels: usize, frame_number: u32, timestamp: u64) -> Vec<u8> {
    let length = 4 + 8 + 2 + 6 + num_pixels * 6 + 8;
    let mut buf = Vec::with_capacity(length);
    buf.extend_from_slice(&(length as u32).to_le_bytes());
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes()); // dataset version
    buf.extend_from_slice(&frame_number.to_le_bytes());
    buf.push(0); // data quality
    buf.push(0); // device status
    for i in 0..num_pixels {
        buf.extend_from_slice(&(100 + i as u16).to_le_bytes());
    }
    for i in 0..num_pixels {
        buf.extend_from_slice(&(200 + i as u16).to_le_bytes());
    }
    for i in 0..num_pixels {
        buf.extend_from_slice(&(300 + i as u16).to_le_bytes());
    }
    buf.extend_from_slice(&0u32.to_le_bytes()); // crc, unused
    buf.extend_from_slice(&(length as u32).to_le_bytes());
    buf
}

/// Version-1 depth map dataset (no extended header).
pub fn tof_depth_binary_v1(num_pixels: usize, timestamp: u64) -> Vec<u8> {
    let length = 4 + 8 + 2 + num_pixels * 6 + 8;
    let mut buf = Vec::with_capacity(length);
    buf.extend_from_slice(&(length as u32).to_le_bytes());
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes());
    for i in 0..num_pixels * 3 {
        buf.extend_from_slice(&(i as u16).to_le_bytes());
    }
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&(length as u32).to_le_bytes());
    buf
}

/// Polar dataset with `beams` beams: distances 1.0, 2.0, ... and
/// confidences 0.5, 1.5, ...
pub fn tof_polar_binary(beams: usize) -> Vec<u8> {
    let length = 4 + 8 + 2 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + beams * 4 + 16 + beams * 4 + 8;
    let mut buf = Vec::with_capacity(length);
    buf.extend_from_slice(&(length as u32).to_le_bytes());
    buf.extend_from_slice(&99u64.to_le_bytes()); // timestamp
    buf.extend_from_slice(&7u16.to_le_bytes()); // device id
    buf.extend_from_slice(&1u32.to_le_bytes()); // scan counter
    buf.extend_from_slice(&2u32.to_le_bytes()); // system counter
    buf.extend_from_slice(&15.0f32.to_le_bytes()); // scan frequency
    buf.extend_from_slice(&15.0f32.to_le_bytes()); // measurement frequency
    buf.extend_from_slice(&(-45.0f32).to_le_bytes()); // first beam angle
    buf.extend_from_slice(&1.5f32.to_le_bytes()); // angular resolution
    buf.extend_from_slice(&1.0f32.to_le_bytes()); // scale
    buf.extend_from_slice(&0.0f32.to_le_bytes()); // offset
    for i in 0..beams {
        buf.extend_from_slice(&(1.0 + i as f32).to_le_bytes());
    }
    buf.extend_from_slice(&[0u8; 16]); // rssi description
    for i in 0..beams {
        buf.extend_from_slice(&(0.5 + i as f32).to_le_bytes());
    }
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&(length as u32).to_le_bytes());
    buf
}

/// Version-2 stereo dataset: z values 0.., RGBA words 0x01010101.. and
/// confidences 0..
pub fn stereo_binary(num_pixels: usize, frame_number: u32, timestamp: u64) -> Vec<u8> {
    let length = 4 + 8 + 2 + 6 + num_pixels * 8 + 8;
    let mut buf = Vec::with_capacity(length);
    buf.extend_from_slice(&(length as u32).to_le_bytes());
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    buf.extend_from_slice(&frame_number.to_le_bytes());
    buf.push(0);
    buf.push(0);
    for i in 0..num_pixels {
        buf.extend_from_slice(&(i as u16).to_le_bytes());
    }
    for i in 0..num_pixels {
        buf.extend_from_slice(&(0x01010101u32 + i as u32).to_le_bytes());
    }
    for i in 0..num_pixels {
        buf.extend_from_slice(&(i as u16).to_le_bytes());
    }
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&(length as u32).to_le_bytes());
    buf
}

/// Segment data (after the packet type byte) for an XML + binary pair.
pub fn segment_data(xml: &[u8], binary: &[u8], change_counter: u32) -> Vec<u8> {
    let mut data = Vec::new();
    push_be(&mut data, 1u16); // blob id
    push_be(&mut data, 3u16); // segment count
    push_be(&mut data, 0u32); // XML offset
    push_be(&mut data, change_counter);
    push_be(&mut data, xml.len() as u32); // binary offset
    push_be(&mut data, change_counter);
    push_be(&mut data, (xml.len() + binary.len()) as u32); // end marker
    push_be(&mut data, change_counter);
    data.extend_from_slice(xml);
    data.extend_from_slice(binary);
    data
}

/// Complete blob package: preamble, length, protocol version, packet type
/// and the segment data.
pub fn blob_packet(segment_data: &[u8]) -> Vec<u8> {
    let mut packet = vec![0x02, 0x02, 0x02, 0x02];
    push_be(&mut packet, (2 + 1 + segment_data.len()) as u32);
    push_be(&mut packet, 0x0001u16); // blob protocol version
    packet.push(0x62); // packet type
    packet.extend_from_slice(segment_data);
    packet
}
