/// 線で結ぶポーズインデックスの組 (始点, 終点)
pub const SKELETON_CONNECTIONS: [(usize, usize); 10] = [
    // 腕
    (11, 13),
    (13, 15),
    (12, 14),
    (14, 16),
    // 肩
    (11, 12),
    // 胴体
    (11, 23),
    (12, 24),
    (23, 24),
    // 頭
    (0, 11),
    (0, 12),
];

/// この可視度を超えたランドマークだけを描画する
pub const VISIBILITY_THRESHOLD: f32 = 0.5;

/// 映像・オーバーレイ共通のキャンバスサイズ
pub const CANVAS_WIDTH: usize = 640;
pub const CANVAS_HEIGHT: usize = 480;

/// ランドマークのマーカー色 (RGB)
pub const LANDMARK_COLOR: u32 = 0xFF0000; // 赤

/// 接続線の色 (RGB)
pub const SKELETON_COLOR: u32 = 0x00FF00; // 緑

pub const DEFAULT_MARKER_RADIUS: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_connections_cover_expected_indices() {
        let used: HashSet<usize> = SKELETON_CONNECTIONS
            .iter()
            .flat_map(|&(a, b)| [a, b])
            .collect();
        let expected: HashSet<usize> = [0, 11, 12, 13, 14, 15, 16, 23, 24].into_iter().collect();
        assert_eq!(used, expected);
    }

    #[test]
    fn test_connections_unique() {
        let unique: HashSet<(usize, usize)> = SKELETON_CONNECTIONS
            .iter()
            .map(|&(a, b)| (a.min(b), a.max(b)))
            .collect();
        assert_eq!(unique.len(), SKELETON_CONNECTIONS.len());
    }
}
